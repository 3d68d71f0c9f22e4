//! Type conversions between domain types and protobuf types.

use crate::query::{
    AnomalyPage, DetailPage, LatestScores, PerformancePage, ScoreRankPage, TrendResult,
};
use crate::scoring::ScoringProfile;
use crate::types::{
    epoch_to_wallclock, wallclock_to_epoch, AnomalyRecord, ClusterStats, CpuCoreDetailRecord,
    DiskDetailRecord, HostScoreSummary, HostStatus, MemDetailRecord, NetDetailRecord, PageParams,
    PerformanceRecord, SoftIrqDetailRecord, SortOrder, TimeRange,
};

// Re-export proto types for convenience
pub use fleetmon_api::fleetmon::v1;

/// Missing time ranges collapse to the epoch instant, a valid empty range.
pub fn time_range_from_proto(range: Option<v1::TimeRange>) -> TimeRange {
    let range = range.unwrap_or_default();
    TimeRange::new(epoch_to_wallclock(range.start_time), epoch_to_wallclock(range.end_time))
}

pub fn page_from_proto(pagination: Option<v1::Pagination>) -> PageParams {
    let pagination = pagination.unwrap_or_default();
    PageParams { page: pagination.page, page_size: pagination.page_size }
}

/// `None` means "use stored scores"; unknown enum values fall back to the
/// default profile rather than silently skipping the rescore the caller
/// asked for.
pub fn profile_from_proto(profile: Option<i32>) -> Option<ScoringProfile> {
    profile.map(|value| ScoringProfile::from_i32(value).unwrap_or_default())
}

pub fn sort_order_from_proto(order: i32) -> SortOrder {
    if order == v1::SortOrder::Asc as i32 {
        SortOrder::Asc
    } else {
        SortOrder::Desc
    }
}

impl From<HostStatus> for v1::HostStatus {
    fn from(status: HostStatus) -> Self {
        match status {
            HostStatus::Online => v1::HostStatus::Online,
            HostStatus::Offline => v1::HostStatus::Offline,
        }
    }
}

impl From<PerformanceRecord> for v1::PerformanceRecord {
    fn from(rec: PerformanceRecord) -> Self {
        Self {
            server_name: rec.server_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            cpu_percent: rec.cpu_percent,
            usr_percent: rec.usr_percent,
            system_percent: rec.system_percent,
            nice_percent: rec.nice_percent,
            idle_percent: rec.idle_percent,
            io_wait_percent: rec.io_wait_percent,
            irq_percent: rec.irq_percent,
            soft_irq_percent: rec.soft_irq_percent,
            load_avg_1: rec.load_avg_1,
            load_avg_3: rec.load_avg_3,
            load_avg_15: rec.load_avg_15,
            mem_used_percent: rec.mem_used_percent,
            mem_total: rec.mem_total,
            mem_free: rec.mem_free,
            mem_avail: rec.mem_avail,
            disk_util_percent: rec.disk_util_percent,
            send_rate: rec.send_rate,
            rcv_rate: rec.rcv_rate,
            score: rec.score,
            cpu_percent_rate: rec.cpu_percent_rate,
            mem_used_percent_rate: rec.mem_used_percent_rate,
            disk_util_percent_rate: rec.disk_util_percent_rate,
            load_avg_1_rate: rec.load_avg_1_rate,
            send_rate_rate: rec.send_rate_rate,
            rcv_rate_rate: rec.rcv_rate_rate,
        }
    }
}

impl From<AnomalyRecord> for v1::AnomalyRecord {
    fn from(rec: AnomalyRecord) -> Self {
        Self {
            server_name: rec.server_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            anomaly_type: rec.anomaly_type.as_str().to_string(),
            severity: rec.severity.as_str().to_string(),
            value: rec.value,
            threshold: rec.threshold,
            metric_name: rec.metric_name.to_string(),
        }
    }
}

impl From<HostScoreSummary> for v1::HostScoreSummary {
    fn from(summary: HostScoreSummary) -> Self {
        Self {
            server_name: summary.server_name,
            score: summary.score,
            last_update: wallclock_to_epoch(summary.last_update),
            status: v1::HostStatus::from(summary.status) as i32,
            cpu_percent: summary.cpu_percent,
            mem_used_percent: summary.mem_used_percent,
            disk_util_percent: summary.disk_util_percent,
            load_avg_1: summary.load_avg_1,
        }
    }
}

impl From<ClusterStats> for v1::ClusterStats {
    fn from(stats: ClusterStats) -> Self {
        Self {
            total_servers: stats.total_servers,
            online_servers: stats.online_servers,
            offline_servers: stats.offline_servers,
            avg_score: stats.avg_score,
            max_score: stats.max_score,
            min_score: stats.min_score,
            best_server: stats.best_server,
            worst_server: stats.worst_server,
        }
    }
}

impl From<NetDetailRecord> for v1::NetDetailRecord {
    fn from(rec: NetDetailRecord) -> Self {
        Self {
            server_name: rec.server_name,
            net_name: rec.net_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            err_in: rec.err_in,
            err_out: rec.err_out,
            drop_in: rec.drop_in,
            drop_out: rec.drop_out,
            rcv_bytes_rate: rec.rcv_bytes_rate,
            snd_bytes_rate: rec.snd_bytes_rate,
            rcv_packets_rate: rec.rcv_packets_rate,
            snd_packets_rate: rec.snd_packets_rate,
        }
    }
}

impl From<DiskDetailRecord> for v1::DiskDetailRecord {
    fn from(rec: DiskDetailRecord) -> Self {
        Self {
            server_name: rec.server_name,
            disk_name: rec.disk_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            read_bytes_per_sec: rec.read_bytes_per_sec,
            write_bytes_per_sec: rec.write_bytes_per_sec,
            read_iops: rec.read_iops,
            write_iops: rec.write_iops,
            avg_read_latency_ms: rec.avg_read_latency_ms,
            avg_write_latency_ms: rec.avg_write_latency_ms,
            util_percent: rec.util_percent,
        }
    }
}

impl From<MemDetailRecord> for v1::MemDetailRecord {
    fn from(rec: MemDetailRecord) -> Self {
        Self {
            server_name: rec.server_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            total: rec.total,
            free: rec.free,
            avail: rec.avail,
            buffers: rec.buffers,
            cached: rec.cached,
            active: rec.active,
            inactive: rec.inactive,
            dirty: rec.dirty,
        }
    }
}

impl From<SoftIrqDetailRecord> for v1::SoftIrqDetailRecord {
    fn from(rec: SoftIrqDetailRecord) -> Self {
        Self {
            server_name: rec.server_name,
            cpu_name: rec.cpu_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            hi: rec.hi,
            timer: rec.timer,
            net_tx: rec.net_tx,
            net_rx: rec.net_rx,
            block: rec.block,
            sched: rec.sched,
        }
    }
}

impl From<CpuCoreDetailRecord> for v1::CpuCoreDetailRecord {
    fn from(rec: CpuCoreDetailRecord) -> Self {
        Self {
            server_name: rec.server_name,
            cpu_name: rec.cpu_name,
            timestamp: wallclock_to_epoch(rec.timestamp),
            cpu_percent: rec.cpu_percent,
            usr_percent: rec.usr_percent,
            system_percent: rec.system_percent,
            nice_percent: rec.nice_percent,
            idle_percent: rec.idle_percent,
            io_wait_percent: rec.io_wait_percent,
            irq_percent: rec.irq_percent,
            soft_irq_percent: rec.soft_irq_percent,
        }
    }
}

impl From<PerformancePage> for v1::QueryPerformanceResponse {
    fn from(page: PerformancePage) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            score_basis: page.score_basis,
        }
    }
}

impl From<TrendResult> for v1::QueryTrendResponse {
    fn from(result: TrendResult) -> Self {
        Self {
            records: result.records.into_iter().map(Into::into).collect(),
            interval_seconds: result.interval_seconds,
            score_basis: result.score_basis,
        }
    }
}

impl From<AnomalyPage> for v1::QueryAnomalyResponse {
    fn from(page: AnomalyPage) -> Self {
        Self {
            anomalies: page.anomalies.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

impl From<ScoreRankPage> for v1::QueryScoreRankResponse {
    fn from(page: ScoreRankPage) -> Self {
        Self {
            servers: page.servers.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            score_basis: page.score_basis,
        }
    }
}

impl From<LatestScores> for v1::QueryLatestScoreResponse {
    fn from(result: LatestScores) -> Self {
        Self {
            servers: result.servers.into_iter().map(Into::into).collect(),
            cluster_stats: Some(result.stats.into()),
            score_basis: result.score_basis,
        }
    }
}

impl From<DetailPage<NetDetailRecord>> for v1::QueryNetDetailResponse {
    fn from(page: DetailPage<NetDetailRecord>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

impl From<DetailPage<DiskDetailRecord>> for v1::QueryDiskDetailResponse {
    fn from(page: DetailPage<DiskDetailRecord>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

impl From<DetailPage<MemDetailRecord>> for v1::QueryMemDetailResponse {
    fn from(page: DetailPage<MemDetailRecord>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

impl From<DetailPage<SoftIrqDetailRecord>> for v1::QuerySoftIrqDetailResponse {
    fn from(page: DetailPage<SoftIrqDetailRecord>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

impl From<DetailPage<CpuCoreDetailRecord>> for v1::QueryCpuCoreDetailResponse {
    fn from(page: DetailPage<CpuCoreDetailRecord>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}
