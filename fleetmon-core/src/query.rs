//! Read-path service: performance listing, trend aggregation, anomaly
//! synthesis, score ranking, cluster view, and per-subsystem detail lookups.
//!
//! Argument validation is fail-fast; store read errors are fail-soft and
//! degrade to empty results. Only an invalid time range and an unavailable
//! backend surface to the transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, instrument};

use crate::error::{FleetError, Result};
use crate::scoring::{self, ScoringProfile, RESCORE_CPU_CORES};
use crate::store::SampleStore;
use crate::types::{
    format_wallclock, now_wallclock, AnomalyRecord, AnomalyThresholds, AnomalyType, ClusterStats,
    CpuCoreDetailRecord, DiskDetailRecord, HostLatest, HostScoreSummary, HostStatus,
    MemDetailRecord, NetDetailRecord, PageParams, PerformanceRecord, Severity,
    SoftIrqDetailRecord, SortOrder, TimeRange,
};

#[derive(Debug, Clone, Default)]
pub struct PerformancePage {
    pub records: Vec<PerformanceRecord>,
    pub total_count: u32,
    pub page: u32,
    pub page_size: u32,
    pub score_basis: String,
}

#[derive(Debug, Clone, Default)]
pub struct TrendResult {
    pub records: Vec<PerformanceRecord>,
    pub interval_seconds: u32,
    pub score_basis: String,
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyPage {
    pub anomalies: Vec<AnomalyRecord>,
    /// Qualifying source rows, not expanded records.
    pub total_count: u32,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreRankPage {
    pub servers: Vec<HostScoreSummary>,
    pub total_count: u32,
    pub page: u32,
    pub page_size: u32,
    pub score_basis: String,
}

#[derive(Debug, Clone, Default)]
pub struct LatestScores {
    pub servers: Vec<HostScoreSummary>,
    pub stats: ClusterStats,
    pub score_basis: String,
}

#[derive(Debug, Clone)]
pub struct DetailPage<T> {
    pub records: Vec<T>,
    pub total_count: u32,
    pub page: u32,
    pub page_size: u32,
}

/// Query-time scoring provenance, echoed in responses. Rescoring works from
/// stored aggregates and therefore assumes a fixed core count.
fn score_basis(profile: Option<ScoringProfile>) -> String {
    match profile {
        None => "stored".to_string(),
        Some(p) => format!("rescored profile={} cpu_cores={}", p.as_str(), RESCORE_CPU_CORES),
    }
}

fn rescore(record: &PerformanceRecord, profile: ScoringProfile) -> f32 {
    scoring::score_from_aggregates(
        record.cpu_percent,
        record.mem_used_percent,
        record.load_avg_1,
        record.disk_util_percent,
        record.send_rate,
        record.rcv_rate,
        profile,
        RESCORE_CPU_CORES,
    ) as f32
}

/// Degrade store read failures to an empty result; only an unavailable
/// backend propagates.
fn soften<T: Default>(result: Result<T>, what: &'static str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e @ FleetError::BackendUnavailable { .. }) => Err(e),
        Err(e) => {
            error!(error = %e, what, "query failed, returning empty result");
            Ok(T::default())
        }
    }
}

pub struct QueryService {
    store: Arc<SampleStore>,
    liveness_ttl: Duration,
}

impl QueryService {
    pub fn new(store: Arc<SampleStore>, liveness_ttl: Duration) -> Self {
        Self { store, liveness_ttl }
    }

    fn validate(&self, range: &TimeRange) -> Result<()> {
        if !range.is_valid() {
            return Err(FleetError::InvalidTimeRange {
                start: format_wallclock(range.start),
                end: format_wallclock(range.end),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_performance(
        &self,
        server_name: &str,
        range: TimeRange,
        page: PageParams,
        profile: Option<ScoringProfile>,
    ) -> Result<PerformancePage> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "performance").increment(1);
        self.validate(&range)?;
        let page = page.normalized();

        let (mut records, total_count) = soften(
            self.store.query_performance(server_name, &range, &page).await,
            "performance",
        )?;
        if let Some(p) = profile {
            for record in &mut records {
                record.score = rescore(record, p);
            }
        }

        Ok(PerformancePage {
            records,
            total_count,
            page: page.page,
            page_size: page.page_size,
            score_basis: score_basis(profile),
        })
    }

    #[instrument(skip(self, range))]
    pub async fn query_trend(
        &self,
        server_name: &str,
        range: TimeRange,
        interval_seconds: u32,
        profile: Option<ScoringProfile>,
    ) -> Result<TrendResult> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "trend").increment(1);
        self.validate(&range)?;

        let mut records = soften(
            self.store.query_trend(server_name, &range, interval_seconds).await,
            "trend",
        )?;
        if let Some(p) = profile {
            for record in &mut records {
                record.score = rescore(record, p);
            }
        }

        Ok(TrendResult { records, interval_seconds, score_basis: score_basis(profile) })
    }

    #[instrument(skip(self, range, thresholds, page))]
    pub async fn query_anomaly(
        &self,
        server_name: &str,
        range: TimeRange,
        thresholds: AnomalyThresholds,
        page: PageParams,
    ) -> Result<AnomalyPage> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "anomaly").increment(1);
        self.validate(&range)?;
        let page = page.normalized();
        let thresholds = thresholds.normalized();

        let (sources, total_count) = soften(
            self.store.query_anomaly_source(server_name, &range, &thresholds, &page).await,
            "anomaly",
        )?;

        let mut anomalies = Vec::new();
        for source in &sources {
            let mut emit = |anomaly_type: AnomalyType, metric_name: &'static str, value: f32, threshold: f32| {
                anomalies.push(AnomalyRecord {
                    server_name: source.server_name.clone(),
                    timestamp: source.timestamp,
                    anomaly_type,
                    severity: severity_for(anomaly_type, value),
                    value,
                    threshold,
                    metric_name,
                });
            };

            if source.cpu_percent > thresholds.cpu {
                emit(AnomalyType::CpuHigh, "cpu_percent", source.cpu_percent, thresholds.cpu);
            }
            if source.mem_used_percent > thresholds.mem {
                emit(AnomalyType::MemHigh, "mem_used_percent", source.mem_used_percent, thresholds.mem);
            }
            if source.disk_util_percent > thresholds.disk {
                emit(AnomalyType::DiskHigh, "disk_util_percent", source.disk_util_percent, thresholds.disk);
            }
            if source.cpu_percent_rate.abs() > thresholds.change_rate {
                emit(
                    AnomalyType::RateSpike,
                    "cpu_percent_rate",
                    source.cpu_percent_rate,
                    thresholds.change_rate,
                );
            }
            if source.mem_used_percent_rate.abs() > thresholds.change_rate {
                emit(
                    AnomalyType::RateSpike,
                    "mem_used_percent_rate",
                    source.mem_used_percent_rate,
                    thresholds.change_rate,
                );
            }
        }

        Ok(AnomalyPage { anomalies, total_count, page: page.page, page_size: page.page_size })
    }

    #[instrument(skip(self, page))]
    pub async fn query_score_rank(
        &self,
        order: SortOrder,
        page: PageParams,
        profile: Option<ScoringProfile>,
    ) -> Result<ScoreRankPage> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "score_rank").increment(1);
        let page = page.normalized();

        let rows = soften(self.store.query_latest_per_host().await, "score_rank")?;
        let total_count = rows.len() as u32;

        let now = now_wallclock();
        let mut servers: Vec<HostScoreSummary> =
            rows.into_iter().map(|row| self.summarize(row, profile, now)).collect();

        match order {
            SortOrder::Asc => servers.sort_by(|a, b| a.score.total_cmp(&b.score)),
            SortOrder::Desc => servers.sort_by(|a, b| b.score.total_cmp(&a.score)),
        }

        // Paginate in memory; an offset beyond the end yields an empty page.
        let offset = page.offset() as usize;
        let servers = if offset >= servers.len() {
            Vec::new()
        } else {
            let end = (offset + page.page_size as usize).min(servers.len());
            servers[offset..end].to_vec()
        };

        Ok(ScoreRankPage {
            servers,
            total_count,
            page: page.page,
            page_size: page.page_size,
            score_basis: score_basis(profile),
        })
    }

    #[instrument(skip(self))]
    pub async fn query_latest_score(
        &self,
        profile: Option<ScoringProfile>,
    ) -> Result<LatestScores> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "latest_score").increment(1);

        let rows = soften(self.store.query_latest_per_host().await, "latest_score")?;

        let now = now_wallclock();
        let mut servers = Vec::with_capacity(rows.len());
        let mut stats = ClusterStats::default();
        let mut total_score = 0.0f32;
        let mut max_score = -1.0f32;
        let mut min_score = 101.0f32;

        for row in rows {
            let summary = self.summarize(row, profile, now);

            match summary.status {
                HostStatus::Online => stats.online_servers += 1,
                HostStatus::Offline => stats.offline_servers += 1,
            }
            total_score += summary.score;
            if summary.score > max_score {
                max_score = summary.score;
                stats.best_server = summary.server_name.clone();
            }
            if summary.score < min_score {
                min_score = summary.score;
                stats.worst_server = summary.server_name.clone();
            }

            servers.push(summary);
        }

        servers.sort_by(|a, b| b.score.total_cmp(&a.score));

        stats.total_servers = servers.len() as u32;
        stats.avg_score =
            if servers.is_empty() { 0.0 } else { total_score / servers.len() as f32 };
        stats.max_score = max_score.max(0.0);
        stats.min_score = if min_score < 101.0 { min_score } else { 0.0 };

        Ok(LatestScores { servers, stats, score_basis: score_basis(profile) })
    }

    fn summarize(
        &self,
        row: HostLatest,
        profile: Option<ScoringProfile>,
        now: chrono::NaiveDateTime,
    ) -> HostScoreSummary {
        let score = match profile {
            Some(p) => scoring::score_from_aggregates(
                row.cpu_percent,
                row.mem_used_percent,
                row.load_avg_1,
                row.disk_util_percent,
                row.send_rate,
                row.rcv_rate,
                p,
                RESCORE_CPU_CORES,
            ) as f32,
            None => row.score,
        };

        let age = (now - row.timestamp).num_seconds();
        let status = if age > self.liveness_ttl.as_secs() as i64 {
            HostStatus::Offline
        } else {
            HostStatus::Online
        };

        HostScoreSummary {
            server_name: row.server_name,
            score,
            last_update: row.timestamp,
            status,
            cpu_percent: row.cpu_percent,
            mem_used_percent: row.mem_used_percent,
            disk_util_percent: row.disk_util_percent,
            load_avg_1: row.load_avg_1,
        }
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_net_detail(
        &self,
        server_name: &str,
        range: TimeRange,
        page: PageParams,
    ) -> Result<DetailPage<NetDetailRecord>> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "net_detail").increment(1);
        self.validate(&range)?;
        let page = page.normalized();
        let (records, total_count) =
            soften(self.store.query_net_detail(server_name, &range, &page).await, "net_detail")?;
        Ok(DetailPage { records, total_count, page: page.page, page_size: page.page_size })
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_disk_detail(
        &self,
        server_name: &str,
        range: TimeRange,
        page: PageParams,
    ) -> Result<DetailPage<DiskDetailRecord>> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "disk_detail").increment(1);
        self.validate(&range)?;
        let page = page.normalized();
        let (records, total_count) = soften(
            self.store.query_disk_detail(server_name, &range, &page).await,
            "disk_detail",
        )?;
        Ok(DetailPage { records, total_count, page: page.page, page_size: page.page_size })
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_mem_detail(
        &self,
        server_name: &str,
        range: TimeRange,
        page: PageParams,
    ) -> Result<DetailPage<MemDetailRecord>> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "mem_detail").increment(1);
        self.validate(&range)?;
        let page = page.normalized();
        let (records, total_count) =
            soften(self.store.query_mem_detail(server_name, &range, &page).await, "mem_detail")?;
        Ok(DetailPage { records, total_count, page: page.page, page_size: page.page_size })
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_softirq_detail(
        &self,
        server_name: &str,
        range: TimeRange,
        page: PageParams,
    ) -> Result<DetailPage<SoftIrqDetailRecord>> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "softirq_detail")
            .increment(1);
        self.validate(&range)?;
        let page = page.normalized();
        let (records, total_count) = soften(
            self.store.query_softirq_detail(server_name, &range, &page).await,
            "softirq_detail",
        )?;
        Ok(DetailPage { records, total_count, page: page.page, page_size: page.page_size })
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_cpu_core_detail(
        &self,
        server_name: &str,
        range: TimeRange,
        page: PageParams,
    ) -> Result<DetailPage<CpuCoreDetailRecord>> {
        metrics::counter!("fleetmon_query_requests_total", "method" => "cpu_core_detail")
            .increment(1);
        self.validate(&range)?;
        let page = page.normalized();
        let (records, total_count) = soften(
            self.store.query_cpu_core_detail(server_name, &range, &page).await,
            "cpu_core_detail",
        )?;
        Ok(DetailPage { records, total_count, page: page.page, page_size: page.page_size })
    }
}

/// Absolute thresholds escalate above 95; rate spikes escalate above |1.0|.
fn severity_for(anomaly_type: AnomalyType, value: f32) -> Severity {
    let critical = match anomaly_type {
        AnomalyType::RateSpike => value.abs() > 1.0,
        _ => value > 95.0,
    };
    if critical {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::PerfRates;
    use crate::types::{parse_wallclock, PerformanceRow};

    fn ts(s: &str) -> chrono::NaiveDateTime {
        parse_wallclock(s).unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(ts(start), ts(end))
    }

    fn perf_row(host: &str, stamp: chrono::NaiveDateTime, cpu: f32, score: f32) -> PerformanceRow {
        PerformanceRow {
            server_name: host.to_string(),
            timestamp: stamp,
            cpu_percent: cpu,
            usr_percent: 0.0,
            system_percent: 0.0,
            nice_percent: 0.0,
            idle_percent: 100.0 - cpu,
            io_wait_percent: 0.0,
            irq_percent: 0.0,
            soft_irq_percent: 0.0,
            load_avg_1: 1.0,
            load_avg_3: 1.0,
            load_avg_15: 1.0,
            mem_used_percent: 50.0,
            mem_total: 16384.0,
            mem_free: 4096.0,
            mem_avail: 8192.0,
            disk_util_percent: 10.0,
            send_rate: 1.0,
            rcv_rate: 1.0,
            score,
            rates: PerfRates::default(),
        }
    }

    async fn service_with_store() -> (QueryService, Arc<SampleStore>) {
        let store = Arc::new(SampleStore::connect_in_memory().await.unwrap());
        (QueryService::new(store.clone(), Duration::from_secs(60)), store)
    }

    #[tokio::test]
    async fn test_invalid_time_range_rejected() {
        let (service, _store) = service_with_store().await;
        let inverted = range("2025-03-01 11:00:00", "2025-03-01 10:00:00");
        let result = service
            .query_performance("h1", inverted, PageParams::default(), None)
            .await;
        assert!(matches!(result, Err(FleetError::InvalidTimeRange { .. })));
    }

    #[tokio::test]
    async fn test_anomaly_expansion_and_severity() {
        let (service, store) = service_with_store().await;

        // One source row breaching the cpu threshold critically and spiking
        // the cpu rate; expansion yields two records from one counted row.
        let mut row = perf_row("h1", ts("2025-03-01 10:00:00"), 100.0, 10.0);
        row.rates.cpu_percent_rate = 1.5;
        store.insert_performance(&row).await.unwrap();

        let result = service
            .query_anomaly(
                "h1",
                range("2025-03-01 10:00:00", "2025-03-01 10:01:00"),
                AnomalyThresholds::default(),
                PageParams::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.total_count, 1);
        assert_eq!(result.anomalies.len(), 2);

        let cpu_high = &result.anomalies[0];
        assert_eq!(cpu_high.anomaly_type, AnomalyType::CpuHigh);
        assert_eq!(cpu_high.severity, Severity::Critical);
        assert_eq!(cpu_high.value, 100.0);
        assert_eq!(cpu_high.threshold, 80.0);

        let spike = &result.anomalies[1];
        assert_eq!(spike.anomaly_type, AnomalyType::RateSpike);
        assert_eq!(spike.metric_name, "cpu_percent_rate");
        assert_eq!(spike.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_rate_spike_boundary_is_warning() {
        let (service, store) = service_with_store().await;

        let mut row = perf_row("h1", ts("2025-03-01 10:00:00"), 10.0, 90.0);
        row.rates.mem_used_percent_rate = 1.0;
        store.insert_performance(&row).await.unwrap();

        let result = service
            .query_anomaly(
                "h1",
                range("2025-03-01 10:00:00", "2025-03-01 10:01:00"),
                AnomalyThresholds::default(),
                PageParams::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].anomaly_type, AnomalyType::RateSpike);
        // |1.0| exceeds the 0.5 threshold but not the critical bar.
        assert_eq!(result.anomalies[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_score_rank_ordering_and_pagination() {
        let (service, store) = service_with_store().await;

        for (host, score) in [("a", 70.0f32), ("b", 85.0), ("c", 60.0)] {
            store
                .insert_performance(&perf_row(host, ts("2025-03-01 10:00:00"), 20.0, score))
                .await
                .unwrap();
        }

        let desc = service
            .query_score_rank(SortOrder::Desc, PageParams { page: 1, page_size: 2 }, None)
            .await
            .unwrap();
        assert_eq!(desc.total_count, 3);
        let scores: Vec<f32> = desc.servers.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![85.0, 70.0]);

        let asc = service
            .query_score_rank(SortOrder::Asc, PageParams { page: 1, page_size: 2 }, None)
            .await
            .unwrap();
        let scores: Vec<f32> = asc.servers.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![60.0, 70.0]);

        // Offset beyond the end yields an empty page, count unchanged.
        let beyond = service
            .query_score_rank(SortOrder::Desc, PageParams { page: 5, page_size: 2 }, None)
            .await
            .unwrap();
        assert!(beyond.servers.is_empty());
        assert_eq!(beyond.total_count, 3);
    }

    #[tokio::test]
    async fn test_latest_score_cluster_stats() {
        let (service, store) = service_with_store().await;

        // A fresh host stays online; a 2025 timestamp is long past the TTL.
        store
            .insert_performance(&perf_row("fresh", now_wallclock(), 20.0, 90.0))
            .await
            .unwrap();
        store
            .insert_performance(&perf_row("stale", ts("2025-03-01 10:00:00"), 20.0, 40.0))
            .await
            .unwrap();

        let result = service.query_latest_score(None).await.unwrap();
        assert_eq!(result.stats.total_servers, 2);
        assert_eq!(result.stats.online_servers, 1);
        assert_eq!(result.stats.offline_servers, 1);
        assert_eq!(result.stats.max_score, 90.0);
        assert_eq!(result.stats.min_score, 40.0);
        assert_eq!(result.stats.avg_score, 65.0);
        assert_eq!(result.stats.best_server, "fresh");
        assert_eq!(result.stats.worst_server, "stale");

        // Sorted descending by score.
        assert_eq!(result.servers[0].server_name, "fresh");
        assert_eq!(result.servers[0].status, HostStatus::Online);
        assert_eq!(result.servers[1].status, HostStatus::Offline);
    }

    #[tokio::test]
    async fn test_latest_score_empty_store() {
        let (service, _store) = service_with_store().await;

        let result = service.query_latest_score(None).await.unwrap();
        assert!(result.servers.is_empty());
        assert_eq!(result.stats.total_servers, 0);
        assert_eq!(result.stats.avg_score, 0.0);
        assert_eq!(result.stats.max_score, 0.0);
        assert_eq!(result.stats.min_score, 0.0);
        assert!(result.stats.best_server.is_empty());
    }

    #[tokio::test]
    async fn test_profile_rescore_reorders() {
        let (service, store) = service_with_store().await;

        // Hot cpu, cold memory: balanced favors the other host, the
        // memory-sensitive profile flips the ranking.
        let mut cpu_hot = perf_row("cpu-hot", ts("2025-03-01 10:00:00"), 90.0, 30.0);
        cpu_hot.mem_used_percent = 10.0;
        store.insert_performance(&cpu_hot).await.unwrap();

        let mut mem_hot = perf_row("mem-hot", ts("2025-03-01 10:00:00"), 10.0, 60.0);
        mem_hot.mem_used_percent = 95.0;
        store.insert_performance(&mem_hot).await.unwrap();

        let balanced = service
            .query_latest_score(Some(ScoringProfile::Balanced))
            .await
            .unwrap();
        let mem_sensitive = service
            .query_latest_score(Some(ScoringProfile::MemorySensitive))
            .await
            .unwrap();

        assert!(balanced.score_basis.contains("BALANCED"));
        let balanced_cpu_hot =
            balanced.servers.iter().find(|s| s.server_name == "cpu-hot").unwrap().score;
        let mem_sensitive_cpu_hot =
            mem_sensitive.servers.iter().find(|s| s.server_name == "cpu-hot").unwrap().score;
        assert!(mem_sensitive_cpu_hot > balanced_cpu_hot);
    }
}
