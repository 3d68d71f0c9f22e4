//! Query result records, one struct per read-path projection.

use chrono::NaiveDateTime;

use super::{AnomalyType, HostStatus, Severity};

/// Full performance-table projection returned by performance and trend
/// queries. Trend buckets reuse the struct; columns the aggregation does not
/// average stay at their defaults.
#[derive(Debug, Clone, Default)]
pub struct PerformanceRecord {
    pub server_name: String,
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f32,
    pub usr_percent: f32,
    pub system_percent: f32,
    pub nice_percent: f32,
    pub idle_percent: f32,
    pub io_wait_percent: f32,
    pub irq_percent: f32,
    pub soft_irq_percent: f32,
    pub load_avg_1: f32,
    pub load_avg_3: f32,
    pub load_avg_15: f32,
    pub mem_used_percent: f32,
    pub mem_total: f32,
    pub mem_free: f32,
    pub mem_avail: f32,
    pub disk_util_percent: f32,
    /// KB/s at the store boundary.
    pub send_rate: f32,
    /// KB/s at the store boundary.
    pub rcv_rate: f32,
    pub score: f32,
    pub cpu_percent_rate: f32,
    pub mem_used_percent_rate: f32,
    pub disk_util_percent_rate: f32,
    pub load_avg_1_rate: f32,
    pub send_rate_rate: f32,
    pub rcv_rate_rate: f32,
}

/// Source-row projection for anomaly synthesis.
#[derive(Debug, Clone)]
pub struct AnomalySource {
    pub server_name: String,
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f32,
    pub mem_used_percent: f32,
    pub disk_util_percent: f32,
    pub cpu_percent_rate: f32,
    pub mem_used_percent_rate: f32,
}

/// Anomaly record synthesized at query time; never persisted.
#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    pub server_name: String,
    pub timestamp: NaiveDateTime,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub value: f32,
    pub threshold: f32,
    pub metric_name: &'static str,
}

/// Newest performance row per host, as read from the store.
#[derive(Debug, Clone)]
pub struct HostLatest {
    pub server_name: String,
    pub score: f32,
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f32,
    pub mem_used_percent: f32,
    pub disk_util_percent: f32,
    pub load_avg_1: f32,
    pub send_rate: f32,
    pub rcv_rate: f32,
}

/// Per-host summary served by ranking and latest-score queries.
#[derive(Debug, Clone)]
pub struct HostScoreSummary {
    pub server_name: String,
    pub score: f32,
    pub last_update: NaiveDateTime,
    pub status: HostStatus,
    pub cpu_percent: f32,
    pub mem_used_percent: f32,
    pub disk_util_percent: f32,
    pub load_avg_1: f32,
}

/// Cluster-wide statistics attached to the latest-score response.
#[derive(Debug, Clone, Default)]
pub struct ClusterStats {
    pub total_servers: u32,
    pub online_servers: u32,
    pub offline_servers: u32,
    pub avg_score: f32,
    pub max_score: f32,
    pub min_score: f32,
    pub best_server: String,
    pub worst_server: String,
}

#[derive(Debug, Clone)]
pub struct NetDetailRecord {
    pub server_name: String,
    pub net_name: String,
    pub timestamp: NaiveDateTime,
    pub err_in: u64,
    pub err_out: u64,
    pub drop_in: u64,
    pub drop_out: u64,
    pub rcv_bytes_rate: f32,
    pub snd_bytes_rate: f32,
    pub rcv_packets_rate: f32,
    pub snd_packets_rate: f32,
}

#[derive(Debug, Clone)]
pub struct DiskDetailRecord {
    pub server_name: String,
    pub disk_name: String,
    pub timestamp: NaiveDateTime,
    pub read_bytes_per_sec: f32,
    pub write_bytes_per_sec: f32,
    pub read_iops: f32,
    pub write_iops: f32,
    pub avg_read_latency_ms: f32,
    pub avg_write_latency_ms: f32,
    pub util_percent: f32,
}

#[derive(Debug, Clone)]
pub struct MemDetailRecord {
    pub server_name: String,
    pub timestamp: NaiveDateTime,
    pub total: f32,
    pub free: f32,
    pub avail: f32,
    pub buffers: f32,
    pub cached: f32,
    pub active: f32,
    pub inactive: f32,
    pub dirty: f32,
}

#[derive(Debug, Clone)]
pub struct SoftIrqDetailRecord {
    pub server_name: String,
    pub cpu_name: String,
    pub timestamp: NaiveDateTime,
    pub hi: i64,
    pub timer: i64,
    pub net_tx: i64,
    pub net_rx: i64,
    pub block: i64,
    pub sched: i64,
}

#[derive(Debug, Clone)]
pub struct CpuCoreDetailRecord {
    pub server_name: String,
    pub cpu_name: String,
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f32,
    pub usr_percent: f32,
    pub system_percent: f32,
    pub nice_percent: f32,
    pub idle_percent: f32,
    pub io_wait_percent: f32,
    pub irq_percent: f32,
    pub soft_irq_percent: f32,
}
