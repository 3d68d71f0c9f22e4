//! Domain types shared across the manager.
//!
//! Query results live in [`records`], ingest write payloads in [`rows`].
//! This module also owns the store-boundary time format: timestamps are
//! serialized as local-wallclock `YYYY-MM-DD HH:MM:SS` strings and parsed
//! symmetrically.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};

pub mod records;
pub mod rows;

pub use records::{
    AnomalyRecord, AnomalySource, ClusterStats, CpuCoreDetailRecord, DiskDetailRecord,
    HostLatest, HostScoreSummary, MemDetailRecord, NetDetailRecord, PerformanceRecord,
    SoftIrqDetailRecord,
};
pub use rows::{
    CpuCoreDetailRow, DiskDetailRow, MemDetailRow, NetDetailRow, PerformanceRow,
    SoftIrqDetailRow,
};

/// Store-boundary timestamp format.
pub const WALLCLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for the store boundary.
pub fn format_wallclock(ts: NaiveDateTime) -> String {
    ts.format(WALLCLOCK_FORMAT).to_string()
}

/// Parse a store-boundary timestamp. Returns `None` on malformed input.
pub fn parse_wallclock(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, WALLCLOCK_FORMAT).ok()
}

/// Current local wallclock, truncated to whole seconds so values survive a
/// round-trip through the store unchanged.
pub fn now_wallclock() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Convert a local wallclock timestamp to unix seconds for the wire.
pub fn wallclock_to_epoch(ts: NaiveDateTime) -> i64 {
    match Local.from_local_datetime(&ts) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        // Nonexistent local time (DST gap): fall back to the UTC reading.
        chrono::LocalResult::None => ts.and_utc().timestamp(),
    }
}

/// Convert unix seconds from the wire to local wallclock.
pub fn epoch_to_wallclock(secs: i64) -> NaiveDateTime {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.naive_local())
        .or_else(|| DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc()))
        .unwrap_or_default()
}

/// Closed query time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// A range is valid when it is not inverted.
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// Pagination parameters as received from the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageParams {
    pub page: u32,
    pub page_size: u32,
}

impl PageParams {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    /// Coerce out-of-range values to defaults: `page >= 1`, `page_size >= 1`.
    pub fn normalized(self) -> Self {
        Self {
            page: if self.page < 1 { Self::DEFAULT_PAGE } else { self.page },
            page_size: if self.page_size < 1 { Self::DEFAULT_PAGE_SIZE } else { self.page_size },
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// Sort direction for score ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Liveness status of a monitored host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Online,
    Offline,
}

/// Condition that triggered an anomaly record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyType {
    CpuHigh,
    MemHigh,
    DiskHigh,
    RateSpike,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuHigh => "CPU_HIGH",
            Self::MemHigh => "MEM_HIGH",
            Self::DiskHigh => "DISK_HIGH",
            Self::RateSpike => "RATE_SPIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Anomaly detection thresholds. Zero or negative values are replaced by the
/// defaults at query time.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyThresholds {
    pub cpu: f32,
    pub mem: f32,
    pub disk: f32,
    pub change_rate: f32,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self { cpu: 80.0, mem: 90.0, disk: 85.0, change_rate: 0.5 }
    }
}

impl AnomalyThresholds {
    /// Replace non-positive thresholds with defaults.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            cpu: if self.cpu > 0.0 { self.cpu } else { defaults.cpu },
            mem: if self.mem > 0.0 { self.mem } else { defaults.mem },
            disk: if self.disk > 0.0 { self.disk } else { defaults.disk },
            change_rate: if self.change_rate > 0.0 {
                self.change_rate
            } else {
                defaults.change_rate
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallclock_round_trip() {
        let ts = now_wallclock();
        let parsed = parse_wallclock(&format_wallclock(ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_epoch_round_trip() {
        let ts = now_wallclock();
        assert_eq!(epoch_to_wallclock(wallclock_to_epoch(ts)), ts);
    }

    #[test]
    fn test_page_params_coercion() {
        let p = PageParams { page: 0, page_size: 0 }.normalized();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 100);

        let p = PageParams { page: 3, page_size: 25 }.normalized();
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);
    }

    #[test]
    fn test_time_range_validation() {
        let a = parse_wallclock("2025-01-01 00:00:00").unwrap();
        let b = parse_wallclock("2025-01-02 00:00:00").unwrap();
        assert!(TimeRange::new(a, b).is_valid());
        assert!(TimeRange::new(a, a).is_valid());
        assert!(!TimeRange::new(b, a).is_valid());
    }

    #[test]
    fn test_threshold_defaulting() {
        let t = AnomalyThresholds { cpu: 0.0, mem: -1.0, disk: 70.0, change_rate: 0.0 }
            .normalized();
        assert_eq!(t.cpu, 80.0);
        assert_eq!(t.mem, 90.0);
        assert_eq!(t.disk, 70.0);
        assert_eq!(t.change_rate, 0.5);
    }
}
