use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod client;
mod commands;

#[derive(Parser)]
#[command(name = "fleetmon")]
#[command(about = "Fleet telemetry query CLI", long_about = None)]
struct Cli {
    /// Manager address
    #[arg(long, default_value = "127.0.0.1:50051", global = true)]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    Balanced,
    HighConcurrency,
    IoIntensive,
    MemorySensitive,
}

impl Profile {
    fn to_proto(self) -> i32 {
        match self {
            Self::Balanced => 0,
            Self::HighConcurrency => 1,
            Self::IoIntensive => 2,
            Self::MemorySensitive => 3,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Historical performance rows for one host
    Performance {
        /// Host key (hostname_ip)
        server: String,

        /// Range start, "YYYY-MM-DD HH:MM:SS" (default: one hour ago)
        #[arg(long)]
        start: Option<String>,

        /// Range end (default: now)
        #[arg(long)]
        end: Option<String>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,

        /// Rescore rows under this profile
        #[arg(long, value_enum)]
        profile: Option<Profile>,
    },

    /// Aggregated trend buckets for one host
    Trend {
        server: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Bucket width in seconds; 0 returns raw rows
        #[arg(long, default_value = "60")]
        interval: u32,

        #[arg(long, value_enum)]
        profile: Option<Profile>,
    },

    /// Threshold and rate-spike anomalies
    Anomaly {
        /// Host key; omit to scan the whole fleet
        #[arg(long, default_value = "")]
        server: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// CPU usage threshold (%)
        #[arg(long, default_value = "0")]
        cpu: f32,

        /// Memory usage threshold (%)
        #[arg(long, default_value = "0")]
        mem: f32,

        /// Disk utilization threshold (%)
        #[arg(long, default_value = "0")]
        disk: f32,

        /// Change-rate threshold
        #[arg(long, default_value = "0")]
        rate: f32,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Hosts ranked by score
    Rank {
        /// Ascending instead of descending
        #[arg(long)]
        asc: bool,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,

        #[arg(long, value_enum)]
        profile: Option<Profile>,
    },

    /// Latest score per host plus cluster stats
    Latest {
        #[arg(long, value_enum)]
        profile: Option<Profile>,
    },

    /// Per-interface network detail
    Net(commands::detail::DetailArgs),

    /// Per-disk I/O detail
    Disk(commands::detail::DetailArgs),

    /// Memory breakdown detail
    Mem(commands::detail::DetailArgs),

    /// Per-CPU softirq detail
    Softirq(commands::detail::DetailArgs),

    /// Latest per-core CPU usage
    CpuCores(commands::detail::DetailArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let addr = cli.addr.clone();

    match cli.command {
        Commands::Performance { server, start, end, page, page_size, profile } => {
            commands::performance::performance(
                &addr,
                &server,
                start.as_deref(),
                end.as_deref(),
                page,
                page_size,
                profile.map(Profile::to_proto),
            )
            .await
        }
        Commands::Trend { server, start, end, interval, profile } => {
            commands::performance::trend(
                &addr,
                &server,
                start.as_deref(),
                end.as_deref(),
                interval,
                profile.map(Profile::to_proto),
            )
            .await
        }
        Commands::Anomaly { server, start, end, cpu, mem, disk, rate, page, page_size } => {
            commands::anomaly::anomaly(
                &addr,
                &server,
                start.as_deref(),
                end.as_deref(),
                [cpu, mem, disk, rate],
                page,
                page_size,
            )
            .await
        }
        Commands::Rank { asc, page, page_size, profile } => {
            commands::scores::rank(&addr, asc, page, page_size, profile.map(Profile::to_proto))
                .await
        }
        Commands::Latest { profile } => {
            commands::scores::latest(&addr, profile.map(Profile::to_proto)).await
        }
        Commands::Net(args) => commands::detail::net(&addr, args).await,
        Commands::Disk(args) => commands::detail::disk(&addr, args).await,
        Commands::Mem(args) => commands::detail::mem(&addr, args).await,
        Commands::Softirq(args) => commands::detail::softirq(&addr, args).await,
        Commands::CpuCores(args) => commands::detail::cpu_cores(&addr, args).await,
    }
}
