//! `fleetmon rank` and `fleetmon latest` commands

use anyhow::Result;
use fleetmon_api::fleetmon::v1::{
    HostScoreSummary, HostStatus, QueryLatestScoreRequest, QueryScoreRankRequest, SortOrder,
};
use tabled::{settings::Style, Table, Tabled};

use crate::client::FleetClient;
use crate::commands::{fmt_epoch, pagination};

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "SCORE")]
    score: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "CPU%")]
    cpu: String,
    #[tabled(rename = "MEM%")]
    mem: String,
    #[tabled(rename = "DISK%")]
    disk: String,
    #[tabled(rename = "LOAD1")]
    load1: String,
    #[tabled(rename = "UPDATED")]
    updated: String,
}

fn score_row(summary: &HostScoreSummary) -> ScoreRow {
    let status = if summary.status == HostStatus::Online as i32 { "ONLINE" } else { "OFFLINE" };
    ScoreRow {
        host: summary.server_name.clone(),
        score: format!("{:.1}", summary.score),
        status: status.to_string(),
        cpu: format!("{:.1}", summary.cpu_percent),
        mem: format!("{:.1}", summary.mem_used_percent),
        disk: format!("{:.1}", summary.disk_util_percent),
        load1: format!("{:.2}", summary.load_avg_1),
        updated: fmt_epoch(summary.last_update),
    }
}

pub async fn rank(
    addr: &str,
    asc: bool,
    page: u32,
    page_size: u32,
    profile: Option<i32>,
) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;

    let order = if asc { SortOrder::Asc } else { SortOrder::Desc };
    let response = client
        .query_score_rank(QueryScoreRankRequest {
            order: order as i32,
            pagination: pagination(page, page_size),
            profile,
        })
        .await?;

    if response.servers.is_empty() {
        println!("No hosts known");
        return Ok(());
    }

    let rows: Vec<ScoreRow> = response.servers.iter().map(score_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
    println!("{} hosts total (score: {})", response.total_count, response.score_basis);

    Ok(())
}

pub async fn latest(addr: &str, profile: Option<i32>) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;

    let response = client.query_latest_score(QueryLatestScoreRequest { profile }).await?;

    if response.servers.is_empty() {
        println!("No hosts known");
        return Ok(());
    }

    let rows: Vec<ScoreRow> = response.servers.iter().map(score_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");

    if let Some(stats) = response.cluster_stats {
        println!(
            "cluster: {} hosts ({} online, {} offline), avg {:.1}, best {} ({:.1}), worst {} ({:.1})",
            stats.total_servers,
            stats.online_servers,
            stats.offline_servers,
            stats.avg_score,
            stats.best_server,
            stats.max_score,
            stats.worst_server,
            stats.min_score,
        );
    }
    println!("score: {}", response.score_basis);

    Ok(())
}
