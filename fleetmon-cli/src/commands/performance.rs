//! `fleetmon performance` and `fleetmon trend` commands

use anyhow::Result;
use fleetmon_api::fleetmon::v1::{QueryPerformanceRequest, QueryTrendRequest};
use tabled::{settings::Style, Table, Tabled};

use crate::client::FleetClient;
use crate::commands::{fmt_epoch, pagination, time_range};

#[derive(Tabled)]
struct PerformanceRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "CPU%")]
    cpu: String,
    #[tabled(rename = "MEM%")]
    mem: String,
    #[tabled(rename = "LOAD1")]
    load1: String,
    #[tabled(rename = "DISK%")]
    disk: String,
    #[tabled(rename = "SEND KB/s")]
    send: String,
    #[tabled(rename = "RECV KB/s")]
    rcv: String,
    #[tabled(rename = "SCORE")]
    score: String,
    #[tabled(rename = "CPU RATE")]
    cpu_rate: String,
}

#[allow(clippy::too_many_arguments)]
pub async fn performance(
    addr: &str,
    server: &str,
    start: Option<&str>,
    end: Option<&str>,
    page: u32,
    page_size: u32,
    profile: Option<i32>,
) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;

    let response = client
        .query_performance(QueryPerformanceRequest {
            server_name: server.to_string(),
            time_range: Some(time_range(start, end)?),
            pagination: pagination(page, page_size),
            profile,
        })
        .await?;

    if response.records.is_empty() {
        println!("No performance data for {server} in range");
        return Ok(());
    }

    let rows: Vec<PerformanceRow> = response
        .records
        .iter()
        .map(|r| PerformanceRow {
            time: fmt_epoch(r.timestamp),
            cpu: format!("{:.1}", r.cpu_percent),
            mem: format!("{:.1}", r.mem_used_percent),
            load1: format!("{:.2}", r.load_avg_1),
            disk: format!("{:.1}", r.disk_util_percent),
            send: format!("{:.1}", r.send_rate),
            rcv: format!("{:.1}", r.rcv_rate),
            score: format!("{:.1}", r.score),
            cpu_rate: format!("{:+.2}", r.cpu_percent_rate),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
    println!(
        "page {} ({} rows), {} total (score: {})",
        response.page,
        response.records.len(),
        response.total_count,
        response.score_basis
    );

    Ok(())
}

pub async fn trend(
    addr: &str,
    server: &str,
    start: Option<&str>,
    end: Option<&str>,
    interval: u32,
    profile: Option<i32>,
) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;

    let response = client
        .query_trend(QueryTrendRequest {
            server_name: server.to_string(),
            time_range: Some(time_range(start, end)?),
            interval_seconds: interval,
            profile,
        })
        .await?;

    if response.records.is_empty() {
        println!("No trend data for {server} in range");
        return Ok(());
    }

    let rows: Vec<PerformanceRow> = response
        .records
        .iter()
        .map(|r| PerformanceRow {
            time: fmt_epoch(r.timestamp),
            cpu: format!("{:.1}", r.cpu_percent),
            mem: format!("{:.1}", r.mem_used_percent),
            load1: format!("{:.2}", r.load_avg_1),
            disk: format!("{:.1}", r.disk_util_percent),
            send: format!("{:.1}", r.send_rate),
            rcv: format!("{:.1}", r.rcv_rate),
            score: format!("{:.1}", r.score),
            cpu_rate: format!("{:+.2}", r.cpu_percent_rate),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
    if interval > 0 {
        println!("{} buckets of {}s", response.records.len(), response.interval_seconds);
    }

    Ok(())
}
