//! Per-subsystem detail commands: net, disk, mem, softirq, cpu-cores

use anyhow::Result;
use clap::Args;
use fleetmon_api::fleetmon::v1::QueryDetailRequest;
use tabled::{settings::Style, Table, Tabled};

use crate::client::FleetClient;
use crate::commands::{fmt_epoch, pagination, time_range};

#[derive(Args)]
pub struct DetailArgs {
    /// Host key (hostname_ip)
    pub server: String,

    /// Range start, "YYYY-MM-DD HH:MM:SS" (default: one hour ago)
    #[arg(long)]
    pub start: Option<String>,

    /// Range end (default: now)
    #[arg(long)]
    pub end: Option<String>,

    #[arg(long, default_value = "1")]
    pub page: u32,

    #[arg(long, default_value = "20")]
    pub page_size: u32,
}

impl DetailArgs {
    fn request(&self) -> Result<QueryDetailRequest> {
        Ok(QueryDetailRequest {
            server_name: self.server.clone(),
            time_range: Some(time_range(self.start.as_deref(), self.end.as_deref())?),
            pagination: pagination(self.page, self.page_size),
        })
    }
}

fn print_table<T: Tabled>(rows: Vec<T>, total: u32) {
    if rows.is_empty() {
        println!("No rows in range");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
    println!("{total} rows total");
}

#[derive(Tabled)]
struct NetRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "IFACE")]
    iface: String,
    #[tabled(rename = "RX B/s")]
    rx: String,
    #[tabled(rename = "TX B/s")]
    tx: String,
    #[tabled(rename = "RX PKT/s")]
    rx_pkts: String,
    #[tabled(rename = "TX PKT/s")]
    tx_pkts: String,
    #[tabled(rename = "ERR I/O")]
    errs: String,
    #[tabled(rename = "DROP I/O")]
    drops: String,
}

pub async fn net(addr: &str, args: DetailArgs) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;
    let response = client.query_net_detail(args.request()?).await?;

    let rows: Vec<NetRow> = response
        .records
        .iter()
        .map(|r| NetRow {
            time: fmt_epoch(r.timestamp),
            iface: r.net_name.clone(),
            rx: format!("{:.0}", r.rcv_bytes_rate),
            tx: format!("{:.0}", r.snd_bytes_rate),
            rx_pkts: format!("{:.0}", r.rcv_packets_rate),
            tx_pkts: format!("{:.0}", r.snd_packets_rate),
            errs: format!("{}/{}", r.err_in, r.err_out),
            drops: format!("{}/{}", r.drop_in, r.drop_out),
        })
        .collect();
    print_table(rows, response.total_count);
    Ok(())
}

#[derive(Tabled)]
struct DiskRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "DISK")]
    disk: String,
    #[tabled(rename = "READ B/s")]
    read: String,
    #[tabled(rename = "WRITE B/s")]
    write: String,
    #[tabled(rename = "R-IOPS")]
    read_iops: String,
    #[tabled(rename = "W-IOPS")]
    write_iops: String,
    #[tabled(rename = "R-LAT ms")]
    read_lat: String,
    #[tabled(rename = "W-LAT ms")]
    write_lat: String,
    #[tabled(rename = "UTIL%")]
    util: String,
}

pub async fn disk(addr: &str, args: DetailArgs) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;
    let response = client.query_disk_detail(args.request()?).await?;

    let rows: Vec<DiskRow> = response
        .records
        .iter()
        .map(|r| DiskRow {
            time: fmt_epoch(r.timestamp),
            disk: r.disk_name.clone(),
            read: format!("{:.0}", r.read_bytes_per_sec),
            write: format!("{:.0}", r.write_bytes_per_sec),
            read_iops: format!("{:.1}", r.read_iops),
            write_iops: format!("{:.1}", r.write_iops),
            read_lat: format!("{:.2}", r.avg_read_latency_ms),
            write_lat: format!("{:.2}", r.avg_write_latency_ms),
            util: format!("{:.1}", r.util_percent),
        })
        .collect();
    print_table(rows, response.total_count);
    Ok(())
}

#[derive(Tabled)]
struct MemRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "FREE")]
    free: String,
    #[tabled(rename = "AVAIL")]
    avail: String,
    #[tabled(rename = "BUFFERS")]
    buffers: String,
    #[tabled(rename = "CACHED")]
    cached: String,
    #[tabled(rename = "ACTIVE")]
    active: String,
    #[tabled(rename = "INACTIVE")]
    inactive: String,
    #[tabled(rename = "DIRTY")]
    dirty: String,
}

pub async fn mem(addr: &str, args: DetailArgs) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;
    let response = client.query_mem_detail(args.request()?).await?;

    let rows: Vec<MemRow> = response
        .records
        .iter()
        .map(|r| MemRow {
            time: fmt_epoch(r.timestamp),
            total: format!("{:.0}", r.total),
            free: format!("{:.0}", r.free),
            avail: format!("{:.0}", r.avail),
            buffers: format!("{:.0}", r.buffers),
            cached: format!("{:.0}", r.cached),
            active: format!("{:.0}", r.active),
            inactive: format!("{:.0}", r.inactive),
            dirty: format!("{:.0}", r.dirty),
        })
        .collect();
    print_table(rows, response.total_count);
    Ok(())
}

#[derive(Tabled)]
struct SoftIrqRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "HI")]
    hi: i64,
    #[tabled(rename = "TIMER")]
    timer: i64,
    #[tabled(rename = "NET_TX")]
    net_tx: i64,
    #[tabled(rename = "NET_RX")]
    net_rx: i64,
    #[tabled(rename = "BLOCK")]
    block: i64,
    #[tabled(rename = "SCHED")]
    sched: i64,
}

pub async fn softirq(addr: &str, args: DetailArgs) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;
    let response = client.query_soft_irq_detail(args.request()?).await?;

    let rows: Vec<SoftIrqRow> = response
        .records
        .iter()
        .map(|r| SoftIrqRow {
            time: fmt_epoch(r.timestamp),
            cpu: r.cpu_name.clone(),
            hi: r.hi,
            timer: r.timer,
            net_tx: r.net_tx,
            net_rx: r.net_rx,
            block: r.block,
            sched: r.sched,
        })
        .collect();
    print_table(rows, response.total_count);
    Ok(())
}

#[derive(Tabled)]
struct CpuCoreRow {
    #[tabled(rename = "CORE")]
    core: String,
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "CPU%")]
    cpu: String,
    #[tabled(rename = "USR%")]
    usr: String,
    #[tabled(rename = "SYS%")]
    sys: String,
    #[tabled(rename = "IDLE%")]
    idle: String,
    #[tabled(rename = "IOWAIT%")]
    io_wait: String,
    #[tabled(rename = "IRQ%")]
    irq: String,
    #[tabled(rename = "SOFTIRQ%")]
    soft_irq: String,
}

pub async fn cpu_cores(addr: &str, args: DetailArgs) -> Result<()> {
    let mut client = FleetClient::connect(addr).await?;
    let response = client.query_cpu_core_detail(args.request()?).await?;

    let rows: Vec<CpuCoreRow> = response
        .records
        .iter()
        .map(|r| CpuCoreRow {
            core: r.cpu_name.clone(),
            time: fmt_epoch(r.timestamp),
            cpu: format!("{:.1}", r.cpu_percent),
            usr: format!("{:.1}", r.usr_percent),
            sys: format!("{:.1}", r.system_percent),
            idle: format!("{:.1}", r.idle_percent),
            io_wait: format!("{:.1}", r.io_wait_percent),
            irq: format!("{:.1}", r.irq_percent),
            soft_irq: format!("{:.1}", r.soft_irq_percent),
        })
        .collect();
    print_table(rows, response.total_count);
    Ok(())
}
