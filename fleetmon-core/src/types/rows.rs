//! Write payloads for the ingest fan-out: one struct per persisted table.
//!
//! Every row pairs the sampled values with the change rates computed against
//! the host's previous sample; both are written in the same insert.

use chrono::NaiveDateTime;

use crate::rate::{
    DiskCounters, DiskRates, MemCounters, MemRates, NetCounters, NetRates, PerfRates,
    SoftIrqCounters, SoftIrqRates,
};

/// Row for `server_performance`.
#[derive(Debug, Clone)]
pub struct PerformanceRow {
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
    /// Max util% across the snapshot's disks.
    pub disk_util_percent: f32,
    /// KB/s, first interface.
    pub send_rate: f32,
    /// KB/s, first interface.
    pub rcv_rate: f32,
    pub score: f32,
    pub rates: PerfRates,
}

/// Row for `server_net_detail`, one per interface.
#[derive(Debug, Clone)]
pub struct NetDetailRow {
    pub server_name: String,
    pub net_name: String,
    pub timestamp: NaiveDateTime,
    pub counters: NetCounters,
    pub rates: NetRates,
}

/// Row for `server_softirq_detail`, one per CPU.
#[derive(Debug, Clone)]
pub struct SoftIrqDetailRow {
    pub server_name: String,
    pub cpu_name: String,
    pub timestamp: NaiveDateTime,
    pub counters: SoftIrqCounters,
    pub rates: SoftIrqRates,
}

/// Row for `server_mem_detail`, at most one per ingest.
#[derive(Debug, Clone)]
pub struct MemDetailRow {
    pub server_name: String,
    pub timestamp: NaiveDateTime,
    pub counters: MemCounters,
    pub rates: MemRates,
}

/// Row for `server_disk_detail`, one per disk.
#[derive(Debug, Clone)]
pub struct DiskDetailRow {
    pub server_name: String,
    pub disk_name: String,
    pub timestamp: NaiveDateTime,
    pub reads: u64,
    pub writes: u64,
    pub sectors_read: u64,
    pub sectors_written: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
    pub io_in_progress: u64,
    pub io_time_ms: u64,
    pub weighted_io_time_ms: u64,
    pub counters: DiskCounters,
    pub rates: DiskRates,
}

/// Row for `server_cpu_core_detail`, one per per-core entry.
#[derive(Debug, Clone)]
pub struct CpuCoreDetailRow {
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
