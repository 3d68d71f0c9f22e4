//! Sample persistence over SQLite.
//!
//! The SampleStore owns the backend connection pool and serializes all
//! reads and writes through it. Each ingest fans out into six tables:
//! the performance summary plus per-interface, per-CPU-softirq, memory,
//! per-disk, and per-core detail rows. Every write is best-effort and
//! independent; a failed row never aborts the ingest that produced it.

use crate::error::{FleetError, Result};
use crate::types::{
    format_wallclock, now_wallclock, parse_wallclock, AnomalySource, AnomalyThresholds,
    CpuCoreDetailRecord, CpuCoreDetailRow, DiskDetailRecord, DiskDetailRow, HostLatest,
    MemDetailRecord, MemDetailRow, NetDetailRecord, NetDetailRow, PageParams, PerformanceRecord,
    PerformanceRow, SoftIrqDetailRecord, SoftIrqDetailRow, TimeRange,
};
use chrono::{DateTime, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

pub mod migrations;

#[cfg(test)]
mod tests;

/// Bound on any single backend operation.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn write_failed(table: &'static str) -> impl FnOnce(sqlx::Error) -> FleetError {
    move |e| {
        metrics::counter!("fleetmon_db_errors_total", "table" => table, "kind" => "write")
            .increment(1);
        FleetError::WriteFailed { table, reason: e.to_string() }
    }
}

fn read_failed(table: &'static str) -> impl FnOnce(sqlx::Error) -> FleetError {
    move |e| {
        metrics::counter!("fleetmon_db_errors_total", "table" => table, "kind" => "read")
            .increment(1);
        FleetError::ReadFailed { table, reason: e.to_string() }
    }
}

fn get_ts(row: &SqliteRow, column: &str) -> NaiveDateTime {
    parse_wallclock(&row.get::<String, _>(column)).unwrap_or_else(now_wallclock)
}

/// Trend buckets come back as epoch seconds under the store's own epoch
/// reading of the wallclock text; materialize them the same way.
fn bucket_to_wallclock(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc()).unwrap_or_default()
}

/// Persistence layer for snapshot history.
#[derive(Clone)]
pub struct SampleStore {
    pool: SqlitePool,
}

impl SampleStore {
    /// Open (creating if missing) the database at `database_url` and bring
    /// the schema up to date. Fails with `BackendUnavailable` when the
    /// backend cannot be reached.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Opening sample store at {}", database_url);
        let options = Self::options(database_url)?;
        Self::init_pool(options, 5).await
    }

    /// In-memory store for tests. A single pooled connection keeps every
    /// operation on the same in-memory database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::options("sqlite::memory:")?;
        Self::init_pool(options, 1).await
    }

    fn options(database_url: &str) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| FleetError::BackendUnavailable { reason: e.to_string() })?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
            .log_statements(tracing::log::LevelFilter::Debug);
        Ok(options)
    }

    async fn init_pool(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| FleetError::BackendUnavailable { reason: e.to_string() })?;

        let store = Self { pool };
        migrations::run(&store.pool).await?;
        Ok(store)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release the backend connections. Idempotent.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(FleetError::BackendUnavailable { reason: "store is closed".to_string() });
        }
        Ok(())
    }

    // ========================
    // Ingest fan-out writes
    // ========================

    #[instrument(skip(self, row), fields(host = %row.server_name))]
    pub async fn insert_performance(&self, row: &PerformanceRow) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO server_performance
                (server_name, timestamp,
                 cpu_percent, usr_percent, system_percent, nice_percent,
                 idle_percent, io_wait_percent, irq_percent, soft_irq_percent,
                 load_avg_1, load_avg_3, load_avg_15,
                 mem_used_percent, total, free, avail,
                 disk_util_percent, send_rate, rcv_rate, score,
                 cpu_percent_rate, usr_percent_rate, system_percent_rate, nice_percent_rate,
                 idle_percent_rate, io_wait_percent_rate, irq_percent_rate, soft_irq_percent_rate,
                 load_avg_1_rate, load_avg_3_rate, load_avg_15_rate,
                 mem_used_percent_rate, total_rate, free_rate, avail_rate,
                 disk_util_percent_rate, send_rate_rate, rcv_rate_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.server_name)
        .bind(format_wallclock(row.timestamp))
        .bind(row.cpu_percent)
        .bind(row.usr_percent)
        .bind(row.system_percent)
        .bind(row.nice_percent)
        .bind(row.idle_percent)
        .bind(row.io_wait_percent)
        .bind(row.irq_percent)
        .bind(row.soft_irq_percent)
        .bind(row.load_avg_1)
        .bind(row.load_avg_3)
        .bind(row.load_avg_15)
        .bind(row.mem_used_percent)
        .bind(row.mem_total)
        .bind(row.mem_free)
        .bind(row.mem_avail)
        .bind(row.disk_util_percent)
        .bind(row.send_rate)
        .bind(row.rcv_rate)
        .bind(row.score)
        .bind(row.rates.cpu_percent_rate)
        .bind(row.rates.usr_percent_rate)
        .bind(row.rates.system_percent_rate)
        .bind(row.rates.nice_percent_rate)
        .bind(row.rates.idle_percent_rate)
        .bind(row.rates.io_wait_percent_rate)
        .bind(row.rates.irq_percent_rate)
        .bind(row.rates.soft_irq_percent_rate)
        .bind(row.rates.load_avg_1_rate)
        .bind(row.rates.load_avg_3_rate)
        .bind(row.rates.load_avg_15_rate)
        .bind(row.rates.mem_used_percent_rate)
        .bind(row.rates.mem_total_rate)
        .bind(row.rates.mem_free_rate)
        .bind(row.rates.mem_avail_rate)
        .bind(row.rates.disk_util_percent_rate)
        .bind(row.rates.send_rate_rate)
        .bind(row.rates.rcv_rate_rate)
        .execute(&self.pool)
        .await
        .map_err(write_failed("server_performance"))?;
        Ok(())
    }

    #[instrument(skip(self, row), fields(host = %row.server_name, iface = %row.net_name))]
    pub async fn insert_net_detail(&self, row: &NetDetailRow) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO server_net_detail
                (server_name, net_name, timestamp,
                 err_in, err_out, drop_in, drop_out,
                 rcv_bytes_rate, rcv_packets_rate, snd_bytes_rate, snd_packets_rate,
                 rcv_bytes_rate_rate, rcv_packets_rate_rate,
                 snd_bytes_rate_rate, snd_packets_rate_rate,
                 err_in_rate, err_out_rate, drop_in_rate, drop_out_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.server_name)
        .bind(&row.net_name)
        .bind(format_wallclock(row.timestamp))
        .bind(row.counters.err_in as i64)
        .bind(row.counters.err_out as i64)
        .bind(row.counters.drop_in as i64)
        .bind(row.counters.drop_out as i64)
        .bind(row.counters.rcv_bytes_rate)
        .bind(row.counters.rcv_packets_rate)
        .bind(row.counters.snd_bytes_rate)
        .bind(row.counters.snd_packets_rate)
        .bind(row.rates.rcv_bytes_rate_rate)
        .bind(row.rates.rcv_packets_rate_rate)
        .bind(row.rates.snd_bytes_rate_rate)
        .bind(row.rates.snd_packets_rate_rate)
        .bind(row.rates.err_in_rate)
        .bind(row.rates.err_out_rate)
        .bind(row.rates.drop_in_rate)
        .bind(row.rates.drop_out_rate)
        .execute(&self.pool)
        .await
        .map_err(write_failed("server_net_detail"))?;
        Ok(())
    }

    #[instrument(skip(self, row), fields(host = %row.server_name, cpu = %row.cpu_name))]
    pub async fn insert_softirq_detail(&self, row: &SoftIrqDetailRow) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO server_softirq_detail
                (server_name, cpu_name, timestamp,
                 hi, timer, net_tx, net_rx, block, irq_poll, tasklet, sched, hrtimer, rcu,
                 hi_rate, timer_rate, net_tx_rate, net_rx_rate, block_rate,
                 irq_poll_rate, tasklet_rate, sched_rate, hrtimer_rate, rcu_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.server_name)
        .bind(&row.cpu_name)
        .bind(format_wallclock(row.timestamp))
        .bind(row.counters.hi as i64)
        .bind(row.counters.timer as i64)
        .bind(row.counters.net_tx as i64)
        .bind(row.counters.net_rx as i64)
        .bind(row.counters.block as i64)
        .bind(row.counters.irq_poll as i64)
        .bind(row.counters.tasklet as i64)
        .bind(row.counters.sched as i64)
        .bind(row.counters.hrtimer as i64)
        .bind(row.counters.rcu as i64)
        .bind(row.rates.hi_rate)
        .bind(row.rates.timer_rate)
        .bind(row.rates.net_tx_rate)
        .bind(row.rates.net_rx_rate)
        .bind(row.rates.block_rate)
        .bind(row.rates.irq_poll_rate)
        .bind(row.rates.tasklet_rate)
        .bind(row.rates.sched_rate)
        .bind(row.rates.hrtimer_rate)
        .bind(row.rates.rcu_rate)
        .execute(&self.pool)
        .await
        .map_err(write_failed("server_softirq_detail"))?;
        Ok(())
    }

    #[instrument(skip(self, row), fields(host = %row.server_name))]
    pub async fn insert_mem_detail(&self, row: &MemDetailRow) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO server_mem_detail
                (server_name, timestamp,
                 total, free, avail, buffers, cached, swap_cached,
                 active, inactive, active_anon, inactive_anon, active_file, inactive_file,
                 dirty, writeback, anon_pages, mapped, kreclaimable, sreclaimable, sunreclaim,
                 total_rate, free_rate, avail_rate, buffers_rate, cached_rate, swap_cached_rate,
                 active_rate, inactive_rate, active_anon_rate, inactive_anon_rate,
                 active_file_rate, inactive_file_rate, dirty_rate, writeback_rate,
                 anon_pages_rate, mapped_rate, kreclaimable_rate, sreclaimable_rate,
                 sunreclaim_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.server_name)
        .bind(format_wallclock(row.timestamp))
        .bind(row.counters.total)
        .bind(row.counters.free)
        .bind(row.counters.avail)
        .bind(row.counters.buffers)
        .bind(row.counters.cached)
        .bind(row.counters.swap_cached)
        .bind(row.counters.active)
        .bind(row.counters.inactive)
        .bind(row.counters.active_anon)
        .bind(row.counters.inactive_anon)
        .bind(row.counters.active_file)
        .bind(row.counters.inactive_file)
        .bind(row.counters.dirty)
        .bind(row.counters.writeback)
        .bind(row.counters.anon_pages)
        .bind(row.counters.mapped)
        .bind(row.counters.kreclaimable)
        .bind(row.counters.sreclaimable)
        .bind(row.counters.sunreclaim)
        .bind(row.rates.total_rate)
        .bind(row.rates.free_rate)
        .bind(row.rates.avail_rate)
        .bind(row.rates.buffers_rate)
        .bind(row.rates.cached_rate)
        .bind(row.rates.swap_cached_rate)
        .bind(row.rates.active_rate)
        .bind(row.rates.inactive_rate)
        .bind(row.rates.active_anon_rate)
        .bind(row.rates.inactive_anon_rate)
        .bind(row.rates.active_file_rate)
        .bind(row.rates.inactive_file_rate)
        .bind(row.rates.dirty_rate)
        .bind(row.rates.writeback_rate)
        .bind(row.rates.anon_pages_rate)
        .bind(row.rates.mapped_rate)
        .bind(row.rates.kreclaimable_rate)
        .bind(row.rates.sreclaimable_rate)
        .bind(row.rates.sunreclaim_rate)
        .execute(&self.pool)
        .await
        .map_err(write_failed("server_mem_detail"))?;
        Ok(())
    }

    #[instrument(skip(self, row), fields(host = %row.server_name, disk = %row.disk_name))]
    pub async fn insert_disk_detail(&self, row: &DiskDetailRow) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO server_disk_detail
                (server_name, disk_name, timestamp,
                 reads, writes, sectors_read, sectors_written,
                 read_time_ms, write_time_ms, io_in_progress, io_time_ms, weighted_io_time_ms,
                 read_bytes_per_sec, write_bytes_per_sec, read_iops, write_iops,
                 avg_read_latency_ms, avg_write_latency_ms, util_percent,
                 read_bytes_per_sec_rate, write_bytes_per_sec_rate, read_iops_rate,
                 write_iops_rate, avg_read_latency_ms_rate, avg_write_latency_ms_rate,
                 util_percent_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.server_name)
        .bind(&row.disk_name)
        .bind(format_wallclock(row.timestamp))
        .bind(row.reads as i64)
        .bind(row.writes as i64)
        .bind(row.sectors_read as i64)
        .bind(row.sectors_written as i64)
        .bind(row.read_time_ms as i64)
        .bind(row.write_time_ms as i64)
        .bind(row.io_in_progress as i64)
        .bind(row.io_time_ms as i64)
        .bind(row.weighted_io_time_ms as i64)
        .bind(row.counters.read_bytes_per_sec)
        .bind(row.counters.write_bytes_per_sec)
        .bind(row.counters.read_iops)
        .bind(row.counters.write_iops)
        .bind(row.counters.avg_read_latency_ms)
        .bind(row.counters.avg_write_latency_ms)
        .bind(row.counters.util_percent)
        .bind(row.rates.read_bytes_per_sec_rate)
        .bind(row.rates.write_bytes_per_sec_rate)
        .bind(row.rates.read_iops_rate)
        .bind(row.rates.write_iops_rate)
        .bind(row.rates.avg_read_latency_ms_rate)
        .bind(row.rates.avg_write_latency_ms_rate)
        .bind(row.rates.util_percent_rate)
        .execute(&self.pool)
        .await
        .map_err(write_failed("server_disk_detail"))?;
        Ok(())
    }

    #[instrument(skip(self, row), fields(host = %row.server_name, core = %row.cpu_name))]
    pub async fn insert_cpu_core_detail(&self, row: &CpuCoreDetailRow) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO server_cpu_core_detail
                (server_name, cpu_name, timestamp,
                 cpu_percent, usr_percent, system_percent, nice_percent,
                 idle_percent, io_wait_percent, irq_percent, soft_irq_percent)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.server_name)
        .bind(&row.cpu_name)
        .bind(format_wallclock(row.timestamp))
        .bind(row.cpu_percent)
        .bind(row.usr_percent)
        .bind(row.system_percent)
        .bind(row.nice_percent)
        .bind(row.idle_percent)
        .bind(row.io_wait_percent)
        .bind(row.irq_percent)
        .bind(row.soft_irq_percent)
        .execute(&self.pool)
        .await
        .map_err(write_failed("server_cpu_core_detail"))?;
        Ok(())
    }

    // ========================
    // Read queries
    // ========================

    /// Rows for one host in the closed range, newest first, paginated.
    /// Returns the page plus the total row count in range.
    #[instrument(skip(self, range, page))]
    pub async fn query_performance(
        &self,
        server_name: &str,
        range: &TimeRange,
        page: &PageParams,
    ) -> Result<(Vec<PerformanceRecord>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM server_performance \
             WHERE server_name = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed("server_performance"))?;

        let rows = sqlx::query(
            r#"
            SELECT server_name, timestamp, cpu_percent, usr_percent, system_percent,
                   nice_percent, idle_percent, io_wait_percent, irq_percent, soft_irq_percent,
                   load_avg_1, load_avg_3, load_avg_15,
                   mem_used_percent, total, free, avail, disk_util_percent,
                   send_rate, rcv_rate, score,
                   cpu_percent_rate, mem_used_percent_rate, disk_util_percent_rate,
                   load_avg_1_rate, send_rate_rate, rcv_rate_rate
            FROM server_performance
            WHERE server_name = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_performance"))?;

        let records = rows.iter().map(Self::row_to_performance).collect();
        Ok((records, total as u32))
    }

    fn row_to_performance(row: &SqliteRow) -> PerformanceRecord {
        PerformanceRecord {
            server_name: row.get("server_name"),
            timestamp: get_ts(row, "timestamp"),
            cpu_percent: row.get("cpu_percent"),
            usr_percent: row.get("usr_percent"),
            system_percent: row.get("system_percent"),
            nice_percent: row.get("nice_percent"),
            idle_percent: row.get("idle_percent"),
            io_wait_percent: row.get("io_wait_percent"),
            irq_percent: row.get("irq_percent"),
            soft_irq_percent: row.get("soft_irq_percent"),
            load_avg_1: row.get("load_avg_1"),
            load_avg_3: row.get("load_avg_3"),
            load_avg_15: row.get("load_avg_15"),
            mem_used_percent: row.get("mem_used_percent"),
            mem_total: row.get("total"),
            mem_free: row.get("free"),
            mem_avail: row.get("avail"),
            disk_util_percent: row.get("disk_util_percent"),
            send_rate: row.get("send_rate"),
            rcv_rate: row.get("rcv_rate"),
            score: row.get("score"),
            cpu_percent_rate: row.get("cpu_percent_rate"),
            mem_used_percent_rate: row.get("mem_used_percent_rate"),
            disk_util_percent_rate: row.get("disk_util_percent_rate"),
            load_avg_1_rate: row.get("load_avg_1_rate"),
            send_rate_rate: row.get("send_rate_rate"),
            rcv_rate_rate: row.get("rcv_rate_rate"),
        }
    }

    /// Trend rows: with a positive interval, fixed-width epoch-aligned
    /// buckets with per-column averages, ordered by bucket; with interval 0,
    /// raw rows ascending.
    #[instrument(skip(self, range))]
    pub async fn query_trend(
        &self,
        server_name: &str,
        range: &TimeRange,
        interval_seconds: u32,
    ) -> Result<Vec<PerformanceRecord>> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        if interval_seconds == 0 {
            let rows = sqlx::query(
                r#"
                SELECT server_name, timestamp, cpu_percent, usr_percent, system_percent,
                       io_wait_percent, load_avg_1, load_avg_3, load_avg_15,
                       mem_used_percent, disk_util_percent, send_rate, rcv_rate, score,
                       cpu_percent_rate, mem_used_percent_rate, disk_util_percent_rate,
                       load_avg_1_rate
                FROM server_performance
                WHERE server_name = ? AND timestamp BETWEEN ? AND ?
                ORDER BY timestamp
                "#,
            )
            .bind(server_name)
            .bind(&start)
            .bind(&end)
            .fetch_all(&self.pool)
            .await
            .map_err(read_failed("server_performance"))?;

            return Ok(rows
                .iter()
                .map(|row| {
                    let mut rec = Self::row_to_trend(row);
                    rec.timestamp = get_ts(row, "timestamp");
                    rec
                })
                .collect());
        }

        let interval = interval_seconds as i64;
        let rows = sqlx::query(
            r#"
            SELECT server_name,
                   (CAST(strftime('%s', timestamp) AS INTEGER) / ?) * ? AS bucket_ts,
                   AVG(cpu_percent) AS cpu_percent,
                   AVG(usr_percent) AS usr_percent,
                   AVG(system_percent) AS system_percent,
                   AVG(io_wait_percent) AS io_wait_percent,
                   AVG(load_avg_1) AS load_avg_1,
                   AVG(load_avg_3) AS load_avg_3,
                   AVG(load_avg_15) AS load_avg_15,
                   AVG(mem_used_percent) AS mem_used_percent,
                   AVG(disk_util_percent) AS disk_util_percent,
                   AVG(send_rate) AS send_rate,
                   AVG(rcv_rate) AS rcv_rate,
                   AVG(score) AS score,
                   AVG(cpu_percent_rate) AS cpu_percent_rate,
                   AVG(mem_used_percent_rate) AS mem_used_percent_rate,
                   AVG(disk_util_percent_rate) AS disk_util_percent_rate,
                   AVG(load_avg_1_rate) AS load_avg_1_rate
            FROM server_performance
            WHERE server_name = ? AND timestamp BETWEEN ? AND ?
            GROUP BY server_name, bucket_ts
            ORDER BY bucket_ts
            "#,
        )
        .bind(interval)
        .bind(interval)
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_performance"))?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut rec = Self::row_to_trend(row);
                rec.timestamp = bucket_to_wallclock(row.get::<i64, _>("bucket_ts"));
                rec
            })
            .collect())
    }

    fn row_to_trend(row: &SqliteRow) -> PerformanceRecord {
        PerformanceRecord {
            server_name: row.get("server_name"),
            cpu_percent: row.get("cpu_percent"),
            usr_percent: row.get("usr_percent"),
            system_percent: row.get("system_percent"),
            io_wait_percent: row.get("io_wait_percent"),
            load_avg_1: row.get("load_avg_1"),
            load_avg_3: row.get("load_avg_3"),
            load_avg_15: row.get("load_avg_15"),
            mem_used_percent: row.get("mem_used_percent"),
            disk_util_percent: row.get("disk_util_percent"),
            send_rate: row.get("send_rate"),
            rcv_rate: row.get("rcv_rate"),
            score: row.get("score"),
            cpu_percent_rate: row.get("cpu_percent_rate"),
            mem_used_percent_rate: row.get("mem_used_percent_rate"),
            disk_util_percent_rate: row.get("disk_util_percent_rate"),
            load_avg_1_rate: row.get("load_avg_1_rate"),
            ..Default::default()
        }
    }

    /// Performance rows breaching any absolute or change-rate threshold.
    /// An empty `server_name` matches all hosts. Newest first, paginated;
    /// the count covers qualifying source rows.
    #[instrument(skip(self, range, thresholds, page))]
    pub async fn query_anomaly_source(
        &self,
        server_name: &str,
        range: &TimeRange,
        thresholds: &AnomalyThresholds,
        page: &PageParams,
    ) -> Result<(Vec<AnomalySource>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let host_clause = if server_name.is_empty() { "" } else { " AND server_name = ?" };
        let breach_clause = "(cpu_percent > ? OR mem_used_percent > ? OR disk_util_percent > ? \
             OR ABS(cpu_percent_rate) > ? OR ABS(mem_used_percent_rate) > ?)";

        let count_sql = format!(
            "SELECT COUNT(*) FROM server_performance \
             WHERE timestamp BETWEEN ? AND ?{host_clause} AND {breach_clause}"
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(&start).bind(&end);
        if !server_name.is_empty() {
            count_query = count_query.bind(server_name);
        }
        let total = count_query
            .bind(thresholds.cpu)
            .bind(thresholds.mem)
            .bind(thresholds.disk)
            .bind(thresholds.change_rate)
            .bind(thresholds.change_rate)
            .fetch_one(&self.pool)
            .await
            .map_err(read_failed("server_performance"))?;

        let rows_sql = format!(
            "SELECT server_name, timestamp, cpu_percent, mem_used_percent, disk_util_percent, \
                    cpu_percent_rate, mem_used_percent_rate \
             FROM server_performance \
             WHERE timestamp BETWEEN ? AND ?{host_clause} AND {breach_clause} \
             ORDER BY timestamp DESC LIMIT ? OFFSET ?"
        );
        let mut rows_query = sqlx::query(&rows_sql).bind(&start).bind(&end);
        if !server_name.is_empty() {
            rows_query = rows_query.bind(server_name);
        }
        let rows = rows_query
            .bind(thresholds.cpu)
            .bind(thresholds.mem)
            .bind(thresholds.disk)
            .bind(thresholds.change_rate)
            .bind(thresholds.change_rate)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(read_failed("server_performance"))?;

        let records = rows
            .iter()
            .map(|row| AnomalySource {
                server_name: row.get("server_name"),
                timestamp: get_ts(row, "timestamp"),
                cpu_percent: row.get("cpu_percent"),
                mem_used_percent: row.get("mem_used_percent"),
                disk_util_percent: row.get("disk_util_percent"),
                cpu_percent_rate: row.get("cpu_percent_rate"),
                mem_used_percent_rate: row.get("mem_used_percent_rate"),
            })
            .collect();
        Ok((records, total as u32))
    }

    /// The newest performance row of every host, newest host first. Feeds
    /// both score ranking and the latest-score cluster view.
    #[instrument(skip(self))]
    pub async fn query_latest_per_host(&self) -> Result<Vec<HostLatest>> {
        self.ensure_open()?;
        let rows = sqlx::query(
            r#"
            SELECT p1.server_name, p1.score, p1.timestamp, p1.cpu_percent,
                   p1.mem_used_percent, p1.disk_util_percent, p1.load_avg_1,
                   p1.send_rate, p1.rcv_rate
            FROM server_performance p1
            INNER JOIN (
                SELECT server_name, MAX(timestamp) AS max_ts
                FROM server_performance GROUP BY server_name
            ) p2 ON p1.server_name = p2.server_name AND p1.timestamp = p2.max_ts
            ORDER BY p1.timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_performance"))?;

        Ok(rows
            .iter()
            .map(|row| HostLatest {
                server_name: row.get("server_name"),
                score: row.get("score"),
                timestamp: get_ts(row, "timestamp"),
                cpu_percent: row.get("cpu_percent"),
                mem_used_percent: row.get("mem_used_percent"),
                disk_util_percent: row.get("disk_util_percent"),
                load_avg_1: row.get("load_avg_1"),
                send_rate: row.get("send_rate"),
                rcv_rate: row.get("rcv_rate"),
            })
            .collect())
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_net_detail(
        &self,
        server_name: &str,
        range: &TimeRange,
        page: &PageParams,
    ) -> Result<(Vec<NetDetailRecord>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM server_net_detail \
             WHERE server_name = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed("server_net_detail"))?;

        let rows = sqlx::query(
            r#"
            SELECT server_name, net_name, timestamp, err_in, err_out, drop_in, drop_out,
                   rcv_bytes_rate, snd_bytes_rate, rcv_packets_rate, snd_packets_rate
            FROM server_net_detail
            WHERE server_name = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_net_detail"))?;

        let records = rows
            .iter()
            .map(|row| NetDetailRecord {
                server_name: row.get("server_name"),
                net_name: row.get("net_name"),
                timestamp: get_ts(row, "timestamp"),
                err_in: row.get::<i64, _>("err_in") as u64,
                err_out: row.get::<i64, _>("err_out") as u64,
                drop_in: row.get::<i64, _>("drop_in") as u64,
                drop_out: row.get::<i64, _>("drop_out") as u64,
                rcv_bytes_rate: row.get("rcv_bytes_rate"),
                snd_bytes_rate: row.get("snd_bytes_rate"),
                rcv_packets_rate: row.get("rcv_packets_rate"),
                snd_packets_rate: row.get("snd_packets_rate"),
            })
            .collect();
        Ok((records, total as u32))
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_disk_detail(
        &self,
        server_name: &str,
        range: &TimeRange,
        page: &PageParams,
    ) -> Result<(Vec<DiskDetailRecord>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM server_disk_detail \
             WHERE server_name = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed("server_disk_detail"))?;

        let rows = sqlx::query(
            r#"
            SELECT server_name, disk_name, timestamp, read_bytes_per_sec, write_bytes_per_sec,
                   read_iops, write_iops, avg_read_latency_ms, avg_write_latency_ms, util_percent
            FROM server_disk_detail
            WHERE server_name = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_disk_detail"))?;

        let records = rows
            .iter()
            .map(|row| DiskDetailRecord {
                server_name: row.get("server_name"),
                disk_name: row.get("disk_name"),
                timestamp: get_ts(row, "timestamp"),
                read_bytes_per_sec: row.get("read_bytes_per_sec"),
                write_bytes_per_sec: row.get("write_bytes_per_sec"),
                read_iops: row.get("read_iops"),
                write_iops: row.get("write_iops"),
                avg_read_latency_ms: row.get("avg_read_latency_ms"),
                avg_write_latency_ms: row.get("avg_write_latency_ms"),
                util_percent: row.get("util_percent"),
            })
            .collect();
        Ok((records, total as u32))
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_mem_detail(
        &self,
        server_name: &str,
        range: &TimeRange,
        page: &PageParams,
    ) -> Result<(Vec<MemDetailRecord>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM server_mem_detail \
             WHERE server_name = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed("server_mem_detail"))?;

        let rows = sqlx::query(
            r#"
            SELECT server_name, timestamp, total, free, avail, buffers, cached,
                   active, inactive, dirty
            FROM server_mem_detail
            WHERE server_name = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_mem_detail"))?;

        let records = rows
            .iter()
            .map(|row| MemDetailRecord {
                server_name: row.get("server_name"),
                timestamp: get_ts(row, "timestamp"),
                total: row.get("total"),
                free: row.get("free"),
                avail: row.get("avail"),
                buffers: row.get("buffers"),
                cached: row.get("cached"),
                active: row.get("active"),
                inactive: row.get("inactive"),
                dirty: row.get("dirty"),
            })
            .collect();
        Ok((records, total as u32))
    }

    #[instrument(skip(self, range, page))]
    pub async fn query_softirq_detail(
        &self,
        server_name: &str,
        range: &TimeRange,
        page: &PageParams,
    ) -> Result<(Vec<SoftIrqDetailRecord>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM server_softirq_detail \
             WHERE server_name = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed("server_softirq_detail"))?;

        let rows = sqlx::query(
            r#"
            SELECT server_name, cpu_name, timestamp, hi, timer, net_tx, net_rx, block, sched
            FROM server_softirq_detail
            WHERE server_name = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_softirq_detail"))?;

        let records = rows
            .iter()
            .map(|row| SoftIrqDetailRecord {
                server_name: row.get("server_name"),
                cpu_name: row.get("cpu_name"),
                timestamp: get_ts(row, "timestamp"),
                hi: row.get("hi"),
                timer: row.get("timer"),
                net_tx: row.get("net_tx"),
                net_rx: row.get("net_rx"),
                block: row.get("block"),
                sched: row.get("sched"),
            })
            .collect();
        Ok((records, total as u32))
    }

    /// The newest row per CPU core within the range, ordered by core name.
    /// The count covers distinct cores seen in range.
    #[instrument(skip(self, range, page))]
    pub async fn query_cpu_core_detail(
        &self,
        server_name: &str,
        range: &TimeRange,
        page: &PageParams,
    ) -> Result<(Vec<CpuCoreDetailRecord>, u32)> {
        self.ensure_open()?;
        let start = format_wallclock(range.start);
        let end = format_wallclock(range.end);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT cpu_name) FROM server_cpu_core_detail \
             WHERE server_name = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed("server_cpu_core_detail"))?;

        let rows = sqlx::query(
            r#"
            SELECT d.server_name, d.cpu_name, d.timestamp, d.cpu_percent, d.usr_percent,
                   d.system_percent, d.nice_percent, d.idle_percent, d.io_wait_percent,
                   d.irq_percent, d.soft_irq_percent
            FROM server_cpu_core_detail d
            INNER JOIN (
                SELECT cpu_name, MAX(timestamp) AS latest_ts
                FROM server_cpu_core_detail
                WHERE server_name = ? AND timestamp BETWEEN ? AND ?
                GROUP BY cpu_name
            ) latest ON d.cpu_name = latest.cpu_name AND d.timestamp = latest.latest_ts
            WHERE d.server_name = ? AND d.timestamp BETWEEN ? AND ?
            ORDER BY d.cpu_name ASC LIMIT ? OFFSET ?
            "#,
        )
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(server_name)
        .bind(&start)
        .bind(&end)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed("server_cpu_core_detail"))?;

        let records = rows
            .iter()
            .map(|row| CpuCoreDetailRecord {
                server_name: row.get("server_name"),
                cpu_name: row.get("cpu_name"),
                timestamp: get_ts(row, "timestamp"),
                cpu_percent: row.get("cpu_percent"),
                usr_percent: row.get("usr_percent"),
                system_percent: row.get("system_percent"),
                nice_percent: row.get("nice_percent"),
                idle_percent: row.get("idle_percent"),
                io_wait_percent: row.get("io_wait_percent"),
                irq_percent: row.get("irq_percent"),
                soft_irq_percent: row.get("soft_irq_percent"),
            })
            .collect();
        Ok((records, total as u32))
    }
}
