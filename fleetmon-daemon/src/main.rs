use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fleetmon_core::{HostManager, QueryService, SampleStore, Settings};
use tracing::info;

mod api;

#[derive(Parser)]
#[command(name = "fleetmond")]
#[command(about = "Host-fleet telemetry manager", long_about = None)]
struct Cli {
    /// gRPC listen address (default 0.0.0.0:50051)
    listen_addr: Option<String>,

    /// Path to a JSON settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend database URL
    #[arg(long, env = "FLEETMON_DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(listen_addr) = cli.listen_addr {
        settings.listen_addr = listen_addr;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    fleetmon_core::init_observability(settings.metrics_port)
        .map_err(|e| anyhow::anyhow!("observability init failed: {e}"))?;

    info!("fleetmond starting");

    let store = Arc::new(SampleStore::connect(&settings.database_url).await?);

    let manager =
        HostManager::new(store.clone(), settings.liveness_ttl(), settings.sweep_interval());
    manager.start();

    let query = Arc::new(QueryService::new(store.clone(), settings.liveness_ttl()));

    let addr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen_addr))?;

    info!("listening on {addr}, waiting for workers to push data");
    api::serve(addr, manager.clone(), query).await?;

    info!("fleetmond shutting down");
    manager.stop();
    store.close().await;

    Ok(())
}
