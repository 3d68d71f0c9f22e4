//! CLI command implementations

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use fleetmon_api::fleetmon::v1::{Pagination, TimeRange};

pub mod anomaly;
pub mod detail;
pub mod performance;
pub mod scores;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_time(s: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .with_context(|| format!("expected \"{TIME_FORMAT}\", got \"{s}\""))?;
    Ok(Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp()))
}

/// Build the request time range: explicit bounds, or the last hour.
pub(crate) fn time_range(start: Option<&str>, end: Option<&str>) -> Result<TimeRange> {
    let end_time = match end {
        Some(s) => parse_time(s)?,
        None => Local::now().timestamp(),
    };
    let start_time = match start {
        Some(s) => parse_time(s)?,
        None => end_time - 3600,
    };
    Ok(TimeRange { start_time, end_time })
}

pub(crate) fn pagination(page: u32, page_size: u32) -> Option<Pagination> {
    Some(Pagination { page, page_size })
}

/// Render a wire timestamp back as local wallclock.
pub(crate) fn fmt_epoch(secs: i64) -> String {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| secs.to_string())
}
