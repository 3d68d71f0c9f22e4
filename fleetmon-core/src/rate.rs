//! Change-rate computation against the previous sample of each host.
//!
//! The engine keeps one prior-sample table per metric family, keyed by
//! HostKey and, where the family has sub-entities, by interface / CPU / disk
//! name. For a given HostKey the caller must make each rate-and-update call
//! atomic; the Host Manager guards the engine with a mutex.

use std::collections::HashMap;

/// Relative change between consecutive samples: `(now - prior) / prior`,
/// defined as 0 when the prior sample is 0.
pub fn rate(now: f32, prior: f32) -> f32 {
    if prior == 0.0 {
        0.0
    } else {
        (now - prior) / prior
    }
}

/// Same rule for unsigned counters, cast to floats before subtracting.
pub fn rate_u64(now: u64, prior: u64) -> f32 {
    rate(now as f32, prior as f32)
}

/// Aggregate performance vector sampled once per ingest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfAggregate {
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
    /// MB/s, first interface.
    pub net_in_rate: f32,
    /// MB/s, first interface.
    pub net_out_rate: f32,
}

/// Change rates for the performance row. `disk_util_percent_rate` is tracked
/// separately from the aggregate vector (it derives from the per-disk max).
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfRates {
    pub cpu_percent_rate: f32,
    pub usr_percent_rate: f32,
    pub system_percent_rate: f32,
    pub nice_percent_rate: f32,
    pub idle_percent_rate: f32,
    pub io_wait_percent_rate: f32,
    pub irq_percent_rate: f32,
    pub soft_irq_percent_rate: f32,
    pub load_avg_1_rate: f32,
    pub load_avg_3_rate: f32,
    pub load_avg_15_rate: f32,
    pub mem_used_percent_rate: f32,
    pub mem_total_rate: f32,
    pub mem_free_rate: f32,
    pub mem_avail_rate: f32,
    pub disk_util_percent_rate: f32,
    /// Rate of the MB/s out-direction aggregate.
    pub send_rate_rate: f32,
    /// Rate of the MB/s in-direction aggregate.
    pub rcv_rate_rate: f32,
}

/// Per-interface sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCounters {
    pub rcv_bytes_rate: f32,
    pub rcv_packets_rate: f32,
    pub snd_bytes_rate: f32,
    pub snd_packets_rate: f32,
    pub err_in: u64,
    pub err_out: u64,
    pub drop_in: u64,
    pub drop_out: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetRates {
    pub rcv_bytes_rate_rate: f32,
    pub rcv_packets_rate_rate: f32,
    pub snd_bytes_rate_rate: f32,
    pub snd_packets_rate_rate: f32,
    pub err_in_rate: f32,
    pub err_out_rate: f32,
    pub drop_in_rate: f32,
    pub drop_out_rate: f32,
}

/// Per-CPU softirq counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftIrqCounters {
    pub hi: u64,
    pub timer: u64,
    pub net_tx: u64,
    pub net_rx: u64,
    pub block: u64,
    pub irq_poll: u64,
    pub tasklet: u64,
    pub sched: u64,
    pub hrtimer: u64,
    pub rcu: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftIrqRates {
    pub hi_rate: f32,
    pub timer_rate: f32,
    pub net_tx_rate: f32,
    pub net_rx_rate: f32,
    pub block_rate: f32,
    pub irq_poll_rate: f32,
    pub tasklet_rate: f32,
    pub sched_rate: f32,
    pub hrtimer_rate: f32,
    pub rcu_rate: f32,
}

/// Memory breakdown sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemCounters {
    pub total: f32,
    pub free: f32,
    pub avail: f32,
    pub buffers: f32,
    pub cached: f32,
    pub swap_cached: f32,
    pub active: f32,
    pub inactive: f32,
    pub active_anon: f32,
    pub inactive_anon: f32,
    pub active_file: f32,
    pub inactive_file: f32,
    pub dirty: f32,
    pub writeback: f32,
    pub anon_pages: f32,
    pub mapped: f32,
    pub kreclaimable: f32,
    pub sreclaimable: f32,
    pub sunreclaim: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemRates {
    pub total_rate: f32,
    pub free_rate: f32,
    pub avail_rate: f32,
    pub buffers_rate: f32,
    pub cached_rate: f32,
    pub swap_cached_rate: f32,
    pub active_rate: f32,
    pub inactive_rate: f32,
    pub active_anon_rate: f32,
    pub inactive_anon_rate: f32,
    pub active_file_rate: f32,
    pub inactive_file_rate: f32,
    pub dirty_rate: f32,
    pub writeback_rate: f32,
    pub anon_pages_rate: f32,
    pub mapped_rate: f32,
    pub kreclaimable_rate: f32,
    pub sreclaimable_rate: f32,
    pub sunreclaim_rate: f32,
}

/// Per-disk I/O sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCounters {
    pub read_bytes_per_sec: f32,
    pub write_bytes_per_sec: f32,
    pub read_iops: f32,
    pub write_iops: f32,
    pub avg_read_latency_ms: f32,
    pub avg_write_latency_ms: f32,
    pub util_percent: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskRates {
    pub read_bytes_per_sec_rate: f32,
    pub write_bytes_per_sec_rate: f32,
    pub read_iops_rate: f32,
    pub write_iops_rate: f32,
    pub avg_read_latency_ms_rate: f32,
    pub avg_write_latency_ms_rate: f32,
    pub util_percent_rate: f32,
}

/// Prior-sample tables. Entries are created on first sight and overwritten
/// on every ingest; they live for the process lifetime.
#[derive(Debug, Default)]
pub struct RateEngine {
    perf: HashMap<String, PerfAggregate>,
    net: HashMap<String, HashMap<String, NetCounters>>,
    softirq: HashMap<String, HashMap<String, SoftIrqCounters>>,
    mem: HashMap<String, MemCounters>,
    disk: HashMap<String, HashMap<String, DiskCounters>>,
    disk_util: HashMap<String, f32>,
}

impl RateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute aggregate rates against the prior vector and store `current`
    /// as the new prior. First sight yields all-zero rates.
    pub fn perf_rates(&mut self, host: &str, current: PerfAggregate) -> PerfRates {
        let prior = self.perf.get(host).copied().unwrap_or_default();
        let rates = PerfRates {
            cpu_percent_rate: rate(current.cpu_percent, prior.cpu_percent),
            usr_percent_rate: rate(current.usr_percent, prior.usr_percent),
            system_percent_rate: rate(current.system_percent, prior.system_percent),
            nice_percent_rate: rate(current.nice_percent, prior.nice_percent),
            idle_percent_rate: rate(current.idle_percent, prior.idle_percent),
            io_wait_percent_rate: rate(current.io_wait_percent, prior.io_wait_percent),
            irq_percent_rate: rate(current.irq_percent, prior.irq_percent),
            soft_irq_percent_rate: rate(current.soft_irq_percent, prior.soft_irq_percent),
            load_avg_1_rate: rate(current.load_avg_1, prior.load_avg_1),
            load_avg_3_rate: rate(current.load_avg_3, prior.load_avg_3),
            load_avg_15_rate: rate(current.load_avg_15, prior.load_avg_15),
            mem_used_percent_rate: rate(current.mem_used_percent, prior.mem_used_percent),
            mem_total_rate: rate(current.mem_total, prior.mem_total),
            mem_free_rate: rate(current.mem_free, prior.mem_free),
            mem_avail_rate: rate(current.mem_avail, prior.mem_avail),
            disk_util_percent_rate: 0.0,
            send_rate_rate: rate(current.net_out_rate, prior.net_out_rate),
            rcv_rate_rate: rate(current.net_in_rate, prior.net_in_rate),
        };
        self.perf.insert(host.to_string(), current);
        rates
    }

    /// Rate of the max-utilization scalar feeding `disk_util_percent_rate`.
    pub fn disk_util_rate(&mut self, host: &str, util_percent: f32) -> f32 {
        let prior = self.disk_util.get(host).copied().unwrap_or_default();
        self.disk_util.insert(host.to_string(), util_percent);
        rate(util_percent, prior)
    }

    pub fn net_rates(&mut self, host: &str, iface: &str, current: NetCounters) -> NetRates {
        let table = self.net.entry(host.to_string()).or_default();
        let prior = table.get(iface).copied().unwrap_or_default();
        let rates = NetRates {
            rcv_bytes_rate_rate: rate(current.rcv_bytes_rate, prior.rcv_bytes_rate),
            rcv_packets_rate_rate: rate(current.rcv_packets_rate, prior.rcv_packets_rate),
            snd_bytes_rate_rate: rate(current.snd_bytes_rate, prior.snd_bytes_rate),
            snd_packets_rate_rate: rate(current.snd_packets_rate, prior.snd_packets_rate),
            err_in_rate: rate_u64(current.err_in, prior.err_in),
            err_out_rate: rate_u64(current.err_out, prior.err_out),
            drop_in_rate: rate_u64(current.drop_in, prior.drop_in),
            drop_out_rate: rate_u64(current.drop_out, prior.drop_out),
        };
        table.insert(iface.to_string(), current);
        rates
    }

    pub fn softirq_rates(
        &mut self,
        host: &str,
        cpu: &str,
        current: SoftIrqCounters,
    ) -> SoftIrqRates {
        let table = self.softirq.entry(host.to_string()).or_default();
        let prior = table.get(cpu).copied().unwrap_or_default();
        let rates = SoftIrqRates {
            hi_rate: rate_u64(current.hi, prior.hi),
            timer_rate: rate_u64(current.timer, prior.timer),
            net_tx_rate: rate_u64(current.net_tx, prior.net_tx),
            net_rx_rate: rate_u64(current.net_rx, prior.net_rx),
            block_rate: rate_u64(current.block, prior.block),
            irq_poll_rate: rate_u64(current.irq_poll, prior.irq_poll),
            tasklet_rate: rate_u64(current.tasklet, prior.tasklet),
            sched_rate: rate_u64(current.sched, prior.sched),
            hrtimer_rate: rate_u64(current.hrtimer, prior.hrtimer),
            rcu_rate: rate_u64(current.rcu, prior.rcu),
        };
        table.insert(cpu.to_string(), current);
        rates
    }

    pub fn mem_rates(&mut self, host: &str, current: MemCounters) -> MemRates {
        let prior = self.mem.get(host).copied().unwrap_or_default();
        let rates = MemRates {
            total_rate: rate(current.total, prior.total),
            free_rate: rate(current.free, prior.free),
            avail_rate: rate(current.avail, prior.avail),
            buffers_rate: rate(current.buffers, prior.buffers),
            cached_rate: rate(current.cached, prior.cached),
            swap_cached_rate: rate(current.swap_cached, prior.swap_cached),
            active_rate: rate(current.active, prior.active),
            inactive_rate: rate(current.inactive, prior.inactive),
            active_anon_rate: rate(current.active_anon, prior.active_anon),
            inactive_anon_rate: rate(current.inactive_anon, prior.inactive_anon),
            active_file_rate: rate(current.active_file, prior.active_file),
            inactive_file_rate: rate(current.inactive_file, prior.inactive_file),
            dirty_rate: rate(current.dirty, prior.dirty),
            writeback_rate: rate(current.writeback, prior.writeback),
            anon_pages_rate: rate(current.anon_pages, prior.anon_pages),
            mapped_rate: rate(current.mapped, prior.mapped),
            kreclaimable_rate: rate(current.kreclaimable, prior.kreclaimable),
            sreclaimable_rate: rate(current.sreclaimable, prior.sreclaimable),
            sunreclaim_rate: rate(current.sunreclaim, prior.sunreclaim),
        };
        self.mem.insert(host.to_string(), current);
        rates
    }

    pub fn disk_rates(&mut self, host: &str, disk: &str, current: DiskCounters) -> DiskRates {
        let table = self.disk.entry(host.to_string()).or_default();
        let prior = table.get(disk).copied().unwrap_or_default();
        let rates = DiskRates {
            read_bytes_per_sec_rate: rate(current.read_bytes_per_sec, prior.read_bytes_per_sec),
            write_bytes_per_sec_rate: rate(
                current.write_bytes_per_sec,
                prior.write_bytes_per_sec,
            ),
            read_iops_rate: rate(current.read_iops, prior.read_iops),
            write_iops_rate: rate(current.write_iops, prior.write_iops),
            avg_read_latency_ms_rate: rate(
                current.avg_read_latency_ms,
                prior.avg_read_latency_ms,
            ),
            avg_write_latency_ms_rate: rate(
                current.avg_write_latency_ms,
                prior.avg_write_latency_ms,
            ),
            util_percent_rate: rate(current.util_percent, prior.util_percent),
        };
        table.insert(disk.to_string(), current);
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_zero_prior() {
        assert_eq!(rate(42.0, 0.0), 0.0);
        assert_eq!(rate_u64(42, 0), 0.0);
    }

    #[test]
    fn test_rate_signed() {
        assert_eq!(rate(100.0, 50.0), 1.0);
        assert_eq!(rate(25.0, 50.0), -0.5);
        assert_eq!(rate_u64(150, 100), 0.5);
    }

    #[test]
    fn test_first_sight_yields_zero_rates() {
        let mut engine = RateEngine::new();
        let rates = engine.perf_rates(
            "h1",
            PerfAggregate { cpu_percent: 50.0, mem_used_percent: 40.0, ..Default::default() },
        );
        assert_eq!(rates.cpu_percent_rate, 0.0);
        assert_eq!(rates.mem_used_percent_rate, 0.0);
    }

    #[test]
    fn test_identical_samples_yield_zero_rates() {
        let mut engine = RateEngine::new();
        let sample = PerfAggregate {
            cpu_percent: 50.0,
            load_avg_1: 2.0,
            mem_used_percent: 40.0,
            net_in_rate: 1.0,
            ..Default::default()
        };
        engine.perf_rates("h1", sample);
        let rates = engine.perf_rates("h1", sample);
        assert_eq!(rates.cpu_percent_rate, 0.0);
        assert_eq!(rates.load_avg_1_rate, 0.0);
        assert_eq!(rates.rcv_rate_rate, 0.0);
    }

    #[test]
    fn test_perf_rate_against_previous() {
        let mut engine = RateEngine::new();
        engine.perf_rates("h1", PerfAggregate { cpu_percent: 50.0, ..Default::default() });
        let rates =
            engine.perf_rates("h1", PerfAggregate { cpu_percent: 100.0, ..Default::default() });
        assert_eq!(rates.cpu_percent_rate, 1.0);
    }

    #[test]
    fn test_sub_entity_scoping() {
        let mut engine = RateEngine::new();
        engine.net_rates("h1", "eth0", NetCounters { rcv_bytes_rate: 100.0, ..Default::default() });
        // Different interface has its own prior; first sight stays zero.
        let rates = engine.net_rates(
            "h1",
            "eth1",
            NetCounters { rcv_bytes_rate: 200.0, ..Default::default() },
        );
        assert_eq!(rates.rcv_bytes_rate_rate, 0.0);

        // Same interface rates against its own history.
        let rates = engine.net_rates(
            "h1",
            "eth0",
            NetCounters { rcv_bytes_rate: 150.0, ..Default::default() },
        );
        assert_eq!(rates.rcv_bytes_rate_rate, 0.5);
    }

    #[test]
    fn test_host_scoping() {
        let mut engine = RateEngine::new();
        engine.mem_rates("h1", MemCounters { total: 1000.0, ..Default::default() });
        let rates = engine.mem_rates("h2", MemCounters { total: 2000.0, ..Default::default() });
        assert_eq!(rates.total_rate, 0.0);
    }

    #[test]
    fn test_disk_util_scalar() {
        let mut engine = RateEngine::new();
        assert_eq!(engine.disk_util_rate("h1", 10.0), 0.0);
        assert_eq!(engine.disk_util_rate("h1", 15.0), 0.5);
    }
}
