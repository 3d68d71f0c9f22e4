//! Host health scoring.
//!
//! A profile maps raw utilization to a single score in [0, 100]. Live ingest
//! scores the full snapshot under [`ScoringProfile::Balanced`]; query paths
//! may rescore persisted aggregate columns under a caller-supplied profile.

use fleetmon_api::fleetmon::v1::MonitorInfo;

/// Core count assumed when rescoring from persisted aggregates, where the
/// per-CPU vector is no longer available.
pub const RESCORE_CPU_CORES: u32 = 4;

/// Named weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScoringProfile {
    #[default]
    Balanced,
    HighConcurrency,
    IoIntensive,
    MemorySensitive,
}

impl ScoringProfile {
    /// Parse from i32 (proto enum value).
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Balanced),
            1 => Some(Self::HighConcurrency),
            2 => Some(Self::IoIntensive),
            3 => Some(Self::MemorySensitive),
            _ => None,
        }
    }

    /// Convert to i32 (proto enum value).
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Balanced => 0,
            Self::HighConcurrency => 1,
            Self::IoIntensive => 2,
            Self::MemorySensitive => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "BALANCED",
            Self::HighConcurrency => "HIGH_CONCURRENCY",
            Self::IoIntensive => "IO_INTENSIVE",
            Self::MemorySensitive => "MEMORY_SENSITIVE",
        }
    }

    pub fn weights(self) -> ScoreWeights {
        match self {
            Self::HighConcurrency => ScoreWeights {
                cpu: 0.45,
                mem: 0.25,
                load: 0.15,
                disk: 0.10,
                net: 0.05,
                load_coefficient: 1.2,
                max_bandwidth: 125_000_000.0,
            },
            Self::IoIntensive => ScoreWeights {
                cpu: 0.20,
                mem: 0.15,
                load: 0.20,
                disk: 0.35,
                net: 0.10,
                load_coefficient: 2.0,
                max_bandwidth: 125_000_000.0,
            },
            Self::MemorySensitive => ScoreWeights {
                cpu: 0.20,
                mem: 0.45,
                load: 0.15,
                disk: 0.10,
                net: 0.10,
                load_coefficient: 1.5,
                max_bandwidth: 125_000_000.0,
            },
            Self::Balanced => ScoreWeights {
                cpu: 0.35,
                mem: 0.30,
                load: 0.15,
                disk: 0.15,
                net: 0.05,
                load_coefficient: 1.5,
                max_bandwidth: 125_000_000.0,
            },
        }
    }
}

/// Component weights plus the load and bandwidth normalization constants.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub cpu: f64,
    pub mem: f64,
    pub load: f64,
    pub disk: f64,
    pub net: f64,
    pub load_coefficient: f64,
    /// Bytes per second.
    pub max_bandwidth: f64,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Score a live snapshot. The core count is the number of per-CPU entries
/// (the aggregate line at index 0 does not count), floored at 1.
pub fn score_snapshot(info: &MonitorInfo, profile: ScoringProfile) -> f64 {
    let mut cpu_percent = 0.0;
    let mut cpu_cores: u32 = 1;
    if let Some(aggregate) = info.cpu_stat.first() {
        cpu_percent = aggregate.cpu_percent as f64;
        cpu_cores = (info.cpu_stat.len() as u32).saturating_sub(1).max(1);
    }

    let load_avg_1 = info.cpu_load.as_ref().map(|l| l.load_avg_1 as f64).unwrap_or(0.0);
    let mem_percent = info.mem_info.as_ref().map(|m| m.used_percent as f64).unwrap_or(0.0);

    let (net_rcv, net_snd) = info
        .net_info
        .first()
        .map(|n| (n.rcv_rate as f64, n.send_rate as f64))
        .unwrap_or((0.0, 0.0));

    let disk_util = info
        .disk_info
        .iter()
        .map(|d| d.util_percent as f64)
        .fold(0.0, f64::max);

    score_components(cpu_percent, mem_percent, load_avg_1, disk_util, net_snd, net_rcv, profile, cpu_cores)
}

/// Rescore from persisted aggregate columns. `send_rate_kb` / `rcv_rate_kb`
/// are the KB/s values the performance table stores.
pub fn score_from_aggregates(
    cpu_percent: f32,
    mem_percent: f32,
    load_avg_1: f32,
    disk_util_percent: f32,
    send_rate_kb: f32,
    rcv_rate_kb: f32,
    profile: ScoringProfile,
    cpu_cores: u32,
) -> f64 {
    score_components(
        cpu_percent as f64,
        mem_percent as f64,
        load_avg_1 as f64,
        disk_util_percent as f64,
        send_rate_kb as f64 * 1024.0,
        rcv_rate_kb as f64 * 1024.0,
        profile,
        cpu_cores,
    )
}

#[allow(clippy::too_many_arguments)]
fn score_components(
    cpu_percent: f64,
    mem_percent: f64,
    load_avg_1: f64,
    disk_util_percent: f64,
    net_snd_bytes: f64,
    net_rcv_bytes: f64,
    profile: ScoringProfile,
    cpu_cores: u32,
) -> f64 {
    let w = profile.weights();
    let cores = cpu_cores.max(1) as f64;

    let cpu_score = clamp01(1.0 - cpu_percent / 100.0);
    let mem_score = clamp01(1.0 - mem_percent / 100.0);
    let load_score = clamp01(1.0 - load_avg_1 / (cores * w.load_coefficient));
    let disk_score = clamp01(1.0 - disk_util_percent / 100.0);
    let net_rcv_score = clamp01(1.0 - net_rcv_bytes / w.max_bandwidth);
    let net_snd_score = clamp01(1.0 - net_snd_bytes / w.max_bandwidth);
    let net_score = (net_rcv_score + net_snd_score) / 2.0;

    let score = cpu_score * w.cpu
        + mem_score * w.mem
        + load_score * w.load
        + disk_score * w.disk
        + net_score * w.net;

    clamp01(score) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmon_api::fleetmon::v1::{CpuLoad, CpuStat, DiskInfo, MemInfo, NetInfo};

    fn snapshot(cpu_percent: f32, cores: usize) -> MonitorInfo {
        let mut cpu_stat = vec![CpuStat {
            cpu_name: "cpu".to_string(),
            cpu_percent,
            ..Default::default()
        }];
        for i in 0..cores {
            cpu_stat.push(CpuStat { cpu_name: format!("cpu{i}"), ..Default::default() });
        }
        MonitorInfo {
            cpu_stat,
            cpu_load: Some(CpuLoad { load_avg_1: 2.0, ..Default::default() }),
            mem_info: Some(MemInfo { used_percent: 40.0, ..Default::default() }),
            net_info: vec![NetInfo {
                name: "eth0".to_string(),
                rcv_rate: 1e6,
                send_rate: 1e6,
                ..Default::default()
            }],
            disk_info: vec![DiskInfo {
                name: "sda".to_string(),
                util_percent: 10.0,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_balanced_snapshot_score() {
        // cpu=0.5, mem=0.6, load=1-2/(4*1.5)=0.667, disk=0.9, net~=0.992
        let score = score_snapshot(&snapshot(50.0, 4), ScoringProfile::Balanced);
        let expected = 0.5 * 0.35
            + 0.6 * 0.30
            + (1.0 - 2.0 / 6.0) * 0.15
            + 0.9 * 0.15
            + (1.0 - 1e6 / 125e6) * 0.05;
        assert!((score - expected * 100.0).abs() < 1e-6, "score = {score}");
    }

    #[test]
    fn test_score_bounds_all_profiles() {
        for profile in [
            ScoringProfile::Balanced,
            ScoringProfile::HighConcurrency,
            ScoringProfile::IoIntensive,
            ScoringProfile::MemorySensitive,
        ] {
            let idle = score_snapshot(&snapshot(0.0, 4), profile);
            let saturated = score_snapshot(&snapshot(400.0, 4), profile);
            assert!((0.0..=100.0).contains(&idle));
            assert!((0.0..=100.0).contains(&saturated));
            assert!(idle > saturated);
        }
    }

    #[test]
    fn test_core_count_floor() {
        // No per-core entries at all: core count floors at 1.
        let info = MonitorInfo {
            cpu_load: Some(CpuLoad { load_avg_1: 3.0, ..Default::default() }),
            ..Default::default()
        };
        let score = score_snapshot(&info, ScoringProfile::Balanced);
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_profile_swap_rescore() {
        // cpu hot, memory cold: the memory-weighted profile scores higher.
        let balanced = score_from_aggregates(
            90.0,
            10.0,
            0.5,
            5.0,
            1.0,
            1.0,
            ScoringProfile::Balanced,
            RESCORE_CPU_CORES,
        );
        let mem_sensitive = score_from_aggregates(
            90.0,
            10.0,
            0.5,
            5.0,
            1.0,
            1.0,
            ScoringProfile::MemorySensitive,
            RESCORE_CPU_CORES,
        );
        assert!(mem_sensitive > balanced);
    }

    #[test]
    fn test_sub_scores_clamped() {
        // Saturated everything still lands in range, floored at 0 per component.
        let score = score_from_aggregates(
            250.0,
            180.0,
            64.0,
            300.0,
            1e9,
            1e9,
            ScoringProfile::IoIntensive,
            RESCORE_CPU_CORES,
        );
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_profile_proto_round_trip() {
        for value in 0..4 {
            let profile = ScoringProfile::from_i32(value).unwrap();
            assert_eq!(profile.to_i32(), value);
        }
        assert_eq!(ScoringProfile::from_i32(99), None);
    }
}
