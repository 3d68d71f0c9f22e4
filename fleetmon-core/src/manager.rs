//! Ingestion coordinator and in-memory liveness.
//!
//! The HostManager receives pushed snapshots from the transport, derives the
//! host key, drives the rate and scoring engines, keeps the live scoreboard,
//! and fans the snapshot out into the sample store. A background sweeper
//! evicts scoreboard entries whose age exceeds the liveness TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fleetmon_api::fleetmon::v1::{CpuStat, DiskInfo, MemInfo, MonitorInfo, NetInfo, SoftIrq};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FleetError, Result};
use crate::rate::{
    DiskCounters, MemCounters, NetCounters, PerfAggregate, RateEngine, SoftIrqCounters,
};
use crate::scoring::{self, ScoringProfile};
use crate::store::SampleStore;
use crate::types::{
    now_wallclock, CpuCoreDetailRow, DiskDetailRow, MemDetailRow, NetDetailRow, PerformanceRow,
    SoftIrqDetailRow,
};

const BYTES_PER_KB: f32 = 1024.0;
const BYTES_PER_MB: f32 = 1024.0 * 1024.0;

/// Live scoreboard entry: the latest snapshot of a host with its score and
/// receive timestamp.
#[derive(Debug, Clone)]
pub struct LiveHostEntry {
    pub info: MonitorInfo,
    pub score: f64,
    pub timestamp: chrono::NaiveDateTime,
}

/// Ingestion coordinator.
pub struct HostManager {
    scoreboard: RwLock<HashMap<String, LiveHostEntry>>,
    rates: Mutex<RateEngine>,
    store: Arc<SampleStore>,
    liveness_ttl: Duration,
    sweep_interval: Duration,
    shutdown: CancellationToken,
}

impl HostManager {
    pub fn new(store: Arc<SampleStore>, liveness_ttl: Duration, sweep_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            scoreboard: RwLock::new(HashMap::new()),
            rates: Mutex::new(RateEngine::new()),
            store,
            liveness_ttl,
            sweep_interval,
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the background scoreboard sweeper.
    pub fn start(self: &Arc<Self>) {
        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = mgr.shutdown.cancelled() => {
                        debug!("scoreboard sweeper stopped");
                        break;
                    }
                    _ = tokio::time::sleep(mgr.sweep_interval) => {
                        mgr.sweep().await;
                    }
                }
            }
        });
    }

    /// Signal the sweeper to exit on its next wake.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Ingest one pushed snapshot. Fails only when the snapshot carries no
    /// usable host identity; store write failures are logged and swallowed.
    pub async fn ingest(&self, info: MonitorInfo) -> Result<()> {
        let Some(host_key) = derive_host_key(&info) else {
            metrics::counter!("fleetmon_ingest_dropped_total").increment(1);
            warn!("dropping snapshot with empty host identity");
            return Err(FleetError::EmptyHostKey);
        };

        let now = now_wallclock();
        let score = scoring::score_snapshot(&info, ScoringProfile::Balanced);
        let disk_util_percent = info
            .disk_info
            .iter()
            .map(|d| d.util_percent)
            .fold(0.0f32, f32::max);

        // Rates and prior updates for the whole snapshot are atomic per host.
        let (perf_row, net_rows, softirq_rows, mem_row, disk_rows, core_rows) = {
            let mut engine = self.rates.lock().await;

            let aggregate = perf_aggregate(&info);
            let mut rates = engine.perf_rates(&host_key, aggregate);
            rates.disk_util_percent_rate = engine.disk_util_rate(&host_key, disk_util_percent);

            let (send_kb, rcv_kb) = info
                .net_info
                .first()
                .map(|n| (n.send_rate / BYTES_PER_KB, n.rcv_rate / BYTES_PER_KB))
                .unwrap_or((0.0, 0.0));

            let perf_row = PerformanceRow {
                server_name: host_key.clone(),
                timestamp: now,
                cpu_percent: aggregate.cpu_percent,
                usr_percent: aggregate.usr_percent,
                system_percent: aggregate.system_percent,
                nice_percent: aggregate.nice_percent,
                idle_percent: aggregate.idle_percent,
                io_wait_percent: aggregate.io_wait_percent,
                irq_percent: aggregate.irq_percent,
                soft_irq_percent: aggregate.soft_irq_percent,
                load_avg_1: aggregate.load_avg_1,
                load_avg_3: aggregate.load_avg_3,
                load_avg_15: aggregate.load_avg_15,
                mem_used_percent: aggregate.mem_used_percent,
                mem_total: aggregate.mem_total,
                mem_free: aggregate.mem_free,
                mem_avail: aggregate.mem_avail,
                disk_util_percent,
                send_rate: send_kb,
                rcv_rate: rcv_kb,
                score: score as f32,
                rates,
            };

            let net_rows: Vec<NetDetailRow> = info
                .net_info
                .iter()
                .map(|n| {
                    let counters = net_counters(n);
                    let rates = engine.net_rates(&host_key, &n.name, counters);
                    NetDetailRow {
                        server_name: host_key.clone(),
                        net_name: n.name.clone(),
                        timestamp: now,
                        counters,
                        rates,
                    }
                })
                .collect();

            let softirq_rows: Vec<SoftIrqDetailRow> = info
                .soft_irq
                .iter()
                .map(|s| {
                    let counters = softirq_counters(s);
                    let rates = engine.softirq_rates(&host_key, &s.cpu, counters);
                    SoftIrqDetailRow {
                        server_name: host_key.clone(),
                        cpu_name: s.cpu.clone(),
                        timestamp: now,
                        counters,
                        rates,
                    }
                })
                .collect();

            let mem_row = info.mem_info.as_ref().map(|m| {
                let counters = mem_counters(m);
                let rates = engine.mem_rates(&host_key, counters);
                MemDetailRow { server_name: host_key.clone(), timestamp: now, counters, rates }
            });

            let disk_rows: Vec<DiskDetailRow> = info
                .disk_info
                .iter()
                .map(|d| {
                    let counters = disk_counters(d);
                    let rates = engine.disk_rates(&host_key, &d.name, counters);
                    DiskDetailRow {
                        server_name: host_key.clone(),
                        disk_name: d.name.clone(),
                        timestamp: now,
                        reads: d.reads,
                        writes: d.writes,
                        sectors_read: d.sectors_read,
                        sectors_written: d.sectors_written,
                        read_time_ms: d.read_time_ms,
                        write_time_ms: d.write_time_ms,
                        io_in_progress: d.io_in_progress,
                        io_time_ms: d.io_time_ms,
                        weighted_io_time_ms: d.weighted_io_time_ms,
                        counters,
                        rates,
                    }
                })
                .collect();

            // Index 0 is the aggregate line; per-core entries follow.
            let core_rows: Vec<CpuCoreDetailRow> = info
                .cpu_stat
                .iter()
                .skip(1)
                .map(|c| core_row(&host_key, now, c))
                .collect();

            (perf_row, net_rows, softirq_rows, mem_row, disk_rows, core_rows)
        };

        // Scoreboard before backend I/O: a wedged store must not delay or
        // corrupt liveness.
        {
            let mut scoreboard = self.scoreboard.write().await;
            scoreboard.insert(
                host_key.clone(),
                LiveHostEntry { info, score, timestamp: now },
            );
            metrics::gauge!("fleetmon_scoreboard_hosts").set(scoreboard.len() as f64);
        }

        metrics::counter!("fleetmon_ingest_total").increment(1);
        debug!(host = %host_key, score, "snapshot ingested");

        // Fan-out writes are best-effort and independent.
        if let Err(e) = self.store.insert_performance(&perf_row).await {
            warn!(host = %host_key, error = %e, "performance insert failed");
        }
        for row in &net_rows {
            if let Err(e) = self.store.insert_net_detail(row).await {
                warn!(host = %host_key, iface = %row.net_name, error = %e, "net detail insert failed");
            }
        }
        for row in &softirq_rows {
            if let Err(e) = self.store.insert_softirq_detail(row).await {
                warn!(host = %host_key, cpu = %row.cpu_name, error = %e, "softirq detail insert failed");
            }
        }
        if let Some(row) = &mem_row {
            if let Err(e) = self.store.insert_mem_detail(row).await {
                warn!(host = %host_key, error = %e, "mem detail insert failed");
            }
        }
        for row in &disk_rows {
            if let Err(e) = self.store.insert_disk_detail(row).await {
                warn!(host = %host_key, disk = %row.disk_name, error = %e, "disk detail insert failed");
            }
        }
        for row in &core_rows {
            if let Err(e) = self.store.insert_cpu_core_detail(row).await {
                warn!(host = %host_key, core = %row.cpu_name, error = %e, "cpu core insert failed");
            }
        }

        Ok(())
    }

    /// Snapshot copy of the current scoreboard.
    pub async fn get_all_host_scores(&self) -> HashMap<String, LiveHostEntry> {
        self.scoreboard.read().await.clone()
    }

    /// Host with the highest current score, empty string when the scoreboard
    /// is empty. Ties break by iteration order.
    pub async fn get_best_host(&self) -> String {
        let scoreboard = self.scoreboard.read().await;
        let mut best_host = String::new();
        let mut best_score = -1.0;
        for (host, entry) in scoreboard.iter() {
            if entry.score > best_score {
                best_score = entry.score;
                best_host = host.clone();
            }
        }
        best_host
    }

    /// Evict scoreboard entries older than the liveness TTL.
    async fn sweep(&self) {
        let now = now_wallclock();
        let ttl = self.liveness_ttl.as_secs() as i64;

        let mut scoreboard = self.scoreboard.write().await;
        scoreboard.retain(|host, entry| {
            let age = (now - entry.timestamp).num_seconds();
            if age > ttl {
                debug!(host = %host, age, "removing stale host");
                false
            } else {
                true
            }
        });
        metrics::gauge!("fleetmon_scoreboard_hosts").set(scoreboard.len() as f64);

        if let Some((host, entry)) =
            scoreboard.iter().max_by(|a, b| a.1.score.total_cmp(&b.1.score))
        {
            debug!(host = %host, score = entry.score, "best host after sweep");
        }
    }
}

/// Canonical host identifier: `hostname_ip` when both are present, a single
/// component when one is, the legacy `name` field as a last resort.
fn derive_host_key(info: &MonitorInfo) -> Option<String> {
    if let Some(host) = &info.host_info {
        if !host.hostname.is_empty() && !host.ip_address.is_empty() {
            return Some(format!("{}_{}", host.hostname, host.ip_address));
        }
        if !host.hostname.is_empty() {
            return Some(host.hostname.clone());
        }
        if !host.ip_address.is_empty() {
            return Some(host.ip_address.clone());
        }
    }
    if !info.name.is_empty() {
        return Some(info.name.clone());
    }
    None
}

fn perf_aggregate(info: &MonitorInfo) -> PerfAggregate {
    let mut aggregate = PerfAggregate::default();

    if let Some(cpu) = info.cpu_stat.first() {
        aggregate.cpu_percent = cpu.cpu_percent;
        aggregate.usr_percent = cpu.usr_percent;
        aggregate.system_percent = cpu.system_percent;
        aggregate.nice_percent = cpu.nice_percent;
        aggregate.idle_percent = cpu.idle_percent;
        aggregate.io_wait_percent = cpu.io_wait_percent;
        aggregate.irq_percent = cpu.irq_percent;
        aggregate.soft_irq_percent = cpu.soft_irq_percent;
    }
    if let Some(load) = &info.cpu_load {
        aggregate.load_avg_1 = load.load_avg_1;
        aggregate.load_avg_3 = load.load_avg_3;
        aggregate.load_avg_15 = load.load_avg_15;
    }
    if let Some(mem) = &info.mem_info {
        aggregate.mem_used_percent = mem.used_percent;
        aggregate.mem_total = mem.total;
        aggregate.mem_free = mem.free;
        aggregate.mem_avail = mem.avail;
    }
    if let Some(net) = info.net_info.first() {
        aggregate.net_in_rate = net.rcv_rate / BYTES_PER_MB;
        aggregate.net_out_rate = net.send_rate / BYTES_PER_MB;
    }

    aggregate
}

fn net_counters(n: &NetInfo) -> NetCounters {
    NetCounters {
        rcv_bytes_rate: n.rcv_rate,
        rcv_packets_rate: n.rcv_packets_rate,
        snd_bytes_rate: n.send_rate,
        snd_packets_rate: n.send_packets_rate,
        err_in: n.err_in,
        err_out: n.err_out,
        drop_in: n.drop_in,
        drop_out: n.drop_out,
    }
}

fn softirq_counters(s: &SoftIrq) -> SoftIrqCounters {
    SoftIrqCounters {
        hi: s.hi,
        timer: s.timer,
        net_tx: s.net_tx,
        net_rx: s.net_rx,
        block: s.block,
        irq_poll: s.irq_poll,
        tasklet: s.tasklet,
        sched: s.sched,
        hrtimer: s.hrtimer,
        rcu: s.rcu,
    }
}

fn mem_counters(m: &MemInfo) -> MemCounters {
    MemCounters {
        total: m.total,
        free: m.free,
        avail: m.avail,
        buffers: m.buffers,
        cached: m.cached,
        swap_cached: m.swap_cached,
        active: m.active,
        inactive: m.inactive,
        active_anon: m.active_anon,
        inactive_anon: m.inactive_anon,
        active_file: m.active_file,
        inactive_file: m.inactive_file,
        dirty: m.dirty,
        writeback: m.writeback,
        anon_pages: m.anon_pages,
        mapped: m.mapped,
        kreclaimable: m.kreclaimable,
        sreclaimable: m.sreclaimable,
        sunreclaim: m.sunreclaim,
    }
}

fn disk_counters(d: &DiskInfo) -> DiskCounters {
    DiskCounters {
        read_bytes_per_sec: d.read_bytes_per_sec,
        write_bytes_per_sec: d.write_bytes_per_sec,
        read_iops: d.read_iops,
        write_iops: d.write_iops,
        avg_read_latency_ms: d.avg_read_latency_ms,
        avg_write_latency_ms: d.avg_write_latency_ms,
        util_percent: d.util_percent,
    }
}

fn core_row(host_key: &str, now: chrono::NaiveDateTime, c: &CpuStat) -> CpuCoreDetailRow {
    CpuCoreDetailRow {
        server_name: host_key.to_string(),
        cpu_name: c.cpu_name.clone(),
        timestamp: now,
        cpu_percent: c.cpu_percent,
        usr_percent: c.usr_percent,
        system_percent: c.system_percent,
        nice_percent: c.nice_percent,
        idle_percent: c.idle_percent,
        io_wait_percent: c.io_wait_percent,
        irq_percent: c.irq_percent,
        soft_irq_percent: c.soft_irq_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmon_api::fleetmon::v1::HostInfo;

    #[test]
    fn test_host_key_hostname_and_ip() {
        let info = MonitorInfo {
            host_info: Some(HostInfo {
                hostname: "web1".to_string(),
                ip_address: "10.0.0.1".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(derive_host_key(&info).as_deref(), Some("web1_10.0.0.1"));
    }

    #[test]
    fn test_host_key_partial_host_info() {
        let info = MonitorInfo {
            host_info: Some(HostInfo { hostname: "web1".to_string(), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(derive_host_key(&info).as_deref(), Some("web1"));

        let info = MonitorInfo {
            host_info: Some(HostInfo { ip_address: "10.0.0.1".to_string(), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(derive_host_key(&info).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_host_key_legacy_name_fallback() {
        let info = MonitorInfo { name: "legacy".to_string(), ..Default::default() };
        assert_eq!(derive_host_key(&info).as_deref(), Some("legacy"));

        // host_info present but empty still falls through to the name.
        let info = MonitorInfo {
            name: "legacy".to_string(),
            host_info: Some(HostInfo::default()),
            ..Default::default()
        };
        assert_eq!(derive_host_key(&info).as_deref(), Some("legacy"));
    }

    #[test]
    fn test_host_key_empty() {
        assert_eq!(derive_host_key(&MonitorInfo::default()), None);
    }
}
