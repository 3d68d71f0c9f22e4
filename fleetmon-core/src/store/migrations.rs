//! Database migrations.

use crate::error::{FleetError, Result};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FleetError::MigrationFailed { reason: e.to_string() })?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| FleetError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| FleetError::MigrationFailed { reason: e.to_string() })?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await
        .map_err(|e| FleetError::MigrationFailed { reason: e.to_string() })?;

    Ok(())
}

async fn exec(pool: &SqlitePool, sql: &str) -> Result<()> {
    sqlx::query(sql)
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| FleetError::MigrationFailed { reason: e.to_string() })
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    // Performance summary, one row per ingest
    exec(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS server_performance (
            server_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            cpu_percent REAL NOT NULL DEFAULT 0,
            usr_percent REAL NOT NULL DEFAULT 0,
            system_percent REAL NOT NULL DEFAULT 0,
            nice_percent REAL NOT NULL DEFAULT 0,
            idle_percent REAL NOT NULL DEFAULT 0,
            io_wait_percent REAL NOT NULL DEFAULT 0,
            irq_percent REAL NOT NULL DEFAULT 0,
            soft_irq_percent REAL NOT NULL DEFAULT 0,
            load_avg_1 REAL NOT NULL DEFAULT 0,
            load_avg_3 REAL NOT NULL DEFAULT 0,
            load_avg_15 REAL NOT NULL DEFAULT 0,
            mem_used_percent REAL NOT NULL DEFAULT 0,
            total REAL NOT NULL DEFAULT 0,
            free REAL NOT NULL DEFAULT 0,
            avail REAL NOT NULL DEFAULT 0,
            disk_util_percent REAL NOT NULL DEFAULT 0,
            send_rate REAL NOT NULL DEFAULT 0,
            rcv_rate REAL NOT NULL DEFAULT 0,
            score REAL NOT NULL DEFAULT 0,
            cpu_percent_rate REAL NOT NULL DEFAULT 0,
            usr_percent_rate REAL NOT NULL DEFAULT 0,
            system_percent_rate REAL NOT NULL DEFAULT 0,
            nice_percent_rate REAL NOT NULL DEFAULT 0,
            idle_percent_rate REAL NOT NULL DEFAULT 0,
            io_wait_percent_rate REAL NOT NULL DEFAULT 0,
            irq_percent_rate REAL NOT NULL DEFAULT 0,
            soft_irq_percent_rate REAL NOT NULL DEFAULT 0,
            load_avg_1_rate REAL NOT NULL DEFAULT 0,
            load_avg_3_rate REAL NOT NULL DEFAULT 0,
            load_avg_15_rate REAL NOT NULL DEFAULT 0,
            mem_used_percent_rate REAL NOT NULL DEFAULT 0,
            total_rate REAL NOT NULL DEFAULT 0,
            free_rate REAL NOT NULL DEFAULT 0,
            avail_rate REAL NOT NULL DEFAULT 0,
            disk_util_percent_rate REAL NOT NULL DEFAULT 0,
            send_rate_rate REAL NOT NULL DEFAULT 0,
            rcv_rate_rate REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .await?;
    exec(
        pool,
        "CREATE INDEX IF NOT EXISTS idx_perf_host_ts ON server_performance(server_name, timestamp)",
    )
    .await?;

    // Per-interface network detail
    exec(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS server_net_detail (
            server_name TEXT NOT NULL,
            net_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            err_in INTEGER NOT NULL DEFAULT 0,
            err_out INTEGER NOT NULL DEFAULT 0,
            drop_in INTEGER NOT NULL DEFAULT 0,
            drop_out INTEGER NOT NULL DEFAULT 0,
            rcv_bytes_rate REAL NOT NULL DEFAULT 0,
            rcv_packets_rate REAL NOT NULL DEFAULT 0,
            snd_bytes_rate REAL NOT NULL DEFAULT 0,
            snd_packets_rate REAL NOT NULL DEFAULT 0,
            rcv_bytes_rate_rate REAL NOT NULL DEFAULT 0,
            rcv_packets_rate_rate REAL NOT NULL DEFAULT 0,
            snd_bytes_rate_rate REAL NOT NULL DEFAULT 0,
            snd_packets_rate_rate REAL NOT NULL DEFAULT 0,
            err_in_rate REAL NOT NULL DEFAULT 0,
            err_out_rate REAL NOT NULL DEFAULT 0,
            drop_in_rate REAL NOT NULL DEFAULT 0,
            drop_out_rate REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .await?;
    exec(
        pool,
        "CREATE INDEX IF NOT EXISTS idx_net_host_ts ON server_net_detail(server_name, timestamp)",
    )
    .await?;

    // Per-CPU softirq detail
    exec(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS server_softirq_detail (
            server_name TEXT NOT NULL,
            cpu_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            hi INTEGER NOT NULL DEFAULT 0,
            timer INTEGER NOT NULL DEFAULT 0,
            net_tx INTEGER NOT NULL DEFAULT 0,
            net_rx INTEGER NOT NULL DEFAULT 0,
            block INTEGER NOT NULL DEFAULT 0,
            irq_poll INTEGER NOT NULL DEFAULT 0,
            tasklet INTEGER NOT NULL DEFAULT 0,
            sched INTEGER NOT NULL DEFAULT 0,
            hrtimer INTEGER NOT NULL DEFAULT 0,
            rcu INTEGER NOT NULL DEFAULT 0,
            hi_rate REAL NOT NULL DEFAULT 0,
            timer_rate REAL NOT NULL DEFAULT 0,
            net_tx_rate REAL NOT NULL DEFAULT 0,
            net_rx_rate REAL NOT NULL DEFAULT 0,
            block_rate REAL NOT NULL DEFAULT 0,
            irq_poll_rate REAL NOT NULL DEFAULT 0,
            tasklet_rate REAL NOT NULL DEFAULT 0,
            sched_rate REAL NOT NULL DEFAULT 0,
            hrtimer_rate REAL NOT NULL DEFAULT 0,
            rcu_rate REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .await?;
    exec(
        pool,
        "CREATE INDEX IF NOT EXISTS idx_softirq_host_ts ON server_softirq_detail(server_name, timestamp)",
    )
    .await?;

    // Memory breakdown detail
    exec(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS server_mem_detail (
            server_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            total REAL NOT NULL DEFAULT 0,
            free REAL NOT NULL DEFAULT 0,
            avail REAL NOT NULL DEFAULT 0,
            buffers REAL NOT NULL DEFAULT 0,
            cached REAL NOT NULL DEFAULT 0,
            swap_cached REAL NOT NULL DEFAULT 0,
            active REAL NOT NULL DEFAULT 0,
            inactive REAL NOT NULL DEFAULT 0,
            active_anon REAL NOT NULL DEFAULT 0,
            inactive_anon REAL NOT NULL DEFAULT 0,
            active_file REAL NOT NULL DEFAULT 0,
            inactive_file REAL NOT NULL DEFAULT 0,
            dirty REAL NOT NULL DEFAULT 0,
            writeback REAL NOT NULL DEFAULT 0,
            anon_pages REAL NOT NULL DEFAULT 0,
            mapped REAL NOT NULL DEFAULT 0,
            kreclaimable REAL NOT NULL DEFAULT 0,
            sreclaimable REAL NOT NULL DEFAULT 0,
            sunreclaim REAL NOT NULL DEFAULT 0,
            total_rate REAL NOT NULL DEFAULT 0,
            free_rate REAL NOT NULL DEFAULT 0,
            avail_rate REAL NOT NULL DEFAULT 0,
            buffers_rate REAL NOT NULL DEFAULT 0,
            cached_rate REAL NOT NULL DEFAULT 0,
            swap_cached_rate REAL NOT NULL DEFAULT 0,
            active_rate REAL NOT NULL DEFAULT 0,
            inactive_rate REAL NOT NULL DEFAULT 0,
            active_anon_rate REAL NOT NULL DEFAULT 0,
            inactive_anon_rate REAL NOT NULL DEFAULT 0,
            active_file_rate REAL NOT NULL DEFAULT 0,
            inactive_file_rate REAL NOT NULL DEFAULT 0,
            dirty_rate REAL NOT NULL DEFAULT 0,
            writeback_rate REAL NOT NULL DEFAULT 0,
            anon_pages_rate REAL NOT NULL DEFAULT 0,
            mapped_rate REAL NOT NULL DEFAULT 0,
            kreclaimable_rate REAL NOT NULL DEFAULT 0,
            sreclaimable_rate REAL NOT NULL DEFAULT 0,
            sunreclaim_rate REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .await?;
    exec(
        pool,
        "CREATE INDEX IF NOT EXISTS idx_mem_host_ts ON server_mem_detail(server_name, timestamp)",
    )
    .await?;

    // Per-disk I/O detail
    exec(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS server_disk_detail (
            server_name TEXT NOT NULL,
            disk_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            reads INTEGER NOT NULL DEFAULT 0,
            writes INTEGER NOT NULL DEFAULT 0,
            sectors_read INTEGER NOT NULL DEFAULT 0,
            sectors_written INTEGER NOT NULL DEFAULT 0,
            read_time_ms INTEGER NOT NULL DEFAULT 0,
            write_time_ms INTEGER NOT NULL DEFAULT 0,
            io_in_progress INTEGER NOT NULL DEFAULT 0,
            io_time_ms INTEGER NOT NULL DEFAULT 0,
            weighted_io_time_ms INTEGER NOT NULL DEFAULT 0,
            read_bytes_per_sec REAL NOT NULL DEFAULT 0,
            write_bytes_per_sec REAL NOT NULL DEFAULT 0,
            read_iops REAL NOT NULL DEFAULT 0,
            write_iops REAL NOT NULL DEFAULT 0,
            avg_read_latency_ms REAL NOT NULL DEFAULT 0,
            avg_write_latency_ms REAL NOT NULL DEFAULT 0,
            util_percent REAL NOT NULL DEFAULT 0,
            read_bytes_per_sec_rate REAL NOT NULL DEFAULT 0,
            write_bytes_per_sec_rate REAL NOT NULL DEFAULT 0,
            read_iops_rate REAL NOT NULL DEFAULT 0,
            write_iops_rate REAL NOT NULL DEFAULT 0,
            avg_read_latency_ms_rate REAL NOT NULL DEFAULT 0,
            avg_write_latency_ms_rate REAL NOT NULL DEFAULT 0,
            util_percent_rate REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .await?;
    exec(
        pool,
        "CREATE INDEX IF NOT EXISTS idx_disk_host_ts ON server_disk_detail(server_name, timestamp)",
    )
    .await?;

    // Per-core CPU detail
    exec(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS server_cpu_core_detail (
            server_name TEXT NOT NULL,
            cpu_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            cpu_percent REAL NOT NULL DEFAULT 0,
            usr_percent REAL NOT NULL DEFAULT 0,
            system_percent REAL NOT NULL DEFAULT 0,
            nice_percent REAL NOT NULL DEFAULT 0,
            idle_percent REAL NOT NULL DEFAULT 0,
            io_wait_percent REAL NOT NULL DEFAULT 0,
            irq_percent REAL NOT NULL DEFAULT 0,
            soft_irq_percent REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .await?;
    exec(
        pool,
        "CREATE INDEX IF NOT EXISTS idx_cpu_core_host_ts ON server_cpu_core_detail(server_name, timestamp)",
    )
    .await?;

    Ok(())
}
