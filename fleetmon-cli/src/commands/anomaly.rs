//! `fleetmon anomaly` command

use anyhow::Result;
use fleetmon_api::fleetmon::v1::QueryAnomalyRequest;
use tabled::{settings::Style, Table, Tabled};

use crate::client::FleetClient;
use crate::commands::{fmt_epoch, pagination, time_range};

#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "TYPE")]
    kind: String,
    #[tabled(rename = "SEVERITY")]
    severity: String,
    #[tabled(rename = "METRIC")]
    metric: String,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "THRESHOLD")]
    threshold: String,
}

pub async fn anomaly(
    addr: &str,
    server: &str,
    start: Option<&str>,
    end: Option<&str>,
    thresholds: [f32; 4],
    page: u32,
    page_size: u32,
) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;

    let [cpu, mem, disk, rate] = thresholds;
    let response = client
        .query_anomaly(QueryAnomalyRequest {
            server_name: server.to_string(),
            time_range: Some(time_range(start, end)?),
            cpu_threshold: cpu,
            mem_threshold: mem,
            disk_threshold: disk,
            change_rate_threshold: rate,
            pagination: pagination(page, page_size),
        })
        .await?;

    if response.anomalies.is_empty() {
        println!("No anomalies in range");
        return Ok(());
    }

    let rows: Vec<AnomalyRow> = response
        .anomalies
        .iter()
        .map(|a| AnomalyRow {
            host: a.server_name.clone(),
            time: fmt_epoch(a.timestamp),
            kind: a.anomaly_type.clone(),
            severity: a.severity.clone(),
            metric: a.metric_name.clone(),
            value: format!("{:.2}", a.value),
            threshold: format!("{:.2}", a.threshold),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
    println!("{} source rows in range", response.total_count);

    Ok(())
}
