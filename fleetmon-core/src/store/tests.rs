#[cfg(test)]
mod tests {
    use crate::rate::{
        DiskCounters, DiskRates, MemCounters, MemRates, NetCounters, NetRates, PerfRates,
        SoftIrqCounters, SoftIrqRates,
    };
    use crate::store::SampleStore;
    use crate::types::{
        parse_wallclock, AnomalyThresholds, CpuCoreDetailRow, DiskDetailRow, MemDetailRow,
        NetDetailRow, PageParams, PerformanceRow, SoftIrqDetailRow, TimeRange,
    };
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> NaiveDateTime {
        parse_wallclock(s).unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(ts(start), ts(end))
    }

    fn page(page: u32, page_size: u32) -> PageParams {
        PageParams { page, page_size }.normalized()
    }

    fn perf_row(host: &str, stamp: &str, cpu: f32, mem: f32, score: f32) -> PerformanceRow {
        PerformanceRow {
            server_name: host.to_string(),
            timestamp: ts(stamp),
            cpu_percent: cpu,
            usr_percent: cpu * 0.6,
            system_percent: cpu * 0.3,
            nice_percent: 0.0,
            idle_percent: 100.0 - cpu,
            io_wait_percent: 1.0,
            irq_percent: 0.2,
            soft_irq_percent: 0.3,
            load_avg_1: 2.0,
            load_avg_3: 1.5,
            load_avg_15: 1.0,
            mem_used_percent: mem,
            mem_total: 16384.0,
            mem_free: 4096.0,
            mem_avail: 8192.0,
            disk_util_percent: 10.0,
            send_rate: 512.0,
            rcv_rate: 1024.0,
            score,
            rates: PerfRates::default(),
        }
    }

    #[tokio::test]
    async fn test_store_init() {
        let store = SampleStore::connect_in_memory().await.unwrap();
        store.close().await;
        // close is idempotent
        store.close().await;
    }

    #[tokio::test]
    async fn test_insert_and_query_performance_round_trip() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        let row = perf_row("web1_10.0.0.1", "2025-03-01 10:00:00", 50.0, 40.0, 63.9);
        store.insert_performance(&row).await.unwrap();

        let (records, total) = store
            .query_performance(
                "web1_10.0.0.1",
                &range("2025-03-01 09:59:59", "2025-03-01 10:00:01"),
                &page(1, 100),
            )
            .await
            .unwrap();

        assert_eq!(total, 1);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.server_name, "web1_10.0.0.1");
        assert_eq!(rec.timestamp, row.timestamp);
        assert_eq!(rec.cpu_percent, 50.0);
        assert_eq!(rec.mem_used_percent, 40.0);
        assert_eq!(rec.mem_total, 16384.0);
        assert_eq!(rec.send_rate, 512.0);
        assert_eq!(rec.rcv_rate, 1024.0);
        assert_eq!(rec.score, 63.9);
        assert_eq!(rec.cpu_percent_rate, 0.0);
    }

    #[tokio::test]
    async fn test_query_performance_closed_range() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        for stamp in ["2025-03-01 10:00:00", "2025-03-01 10:01:00", "2025-03-01 10:02:00"] {
            store.insert_performance(&perf_row("h1", stamp, 20.0, 30.0, 80.0)).await.unwrap();
        }

        // Endpoints are inclusive; the row at 10:02 falls outside.
        let (records, total) = store
            .query_performance(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:01:00"),
                &page(1, 100),
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(records.len(), 2);
        // Newest first.
        assert_eq!(records[0].timestamp, ts("2025-03-01 10:01:00"));
        assert_eq!(records[1].timestamp, ts("2025-03-01 10:00:00"));
    }

    #[tokio::test]
    async fn test_query_performance_pagination() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        for minute in 0..5 {
            let stamp = format!("2025-03-01 10:0{minute}:00");
            store.insert_performance(&perf_row("h1", &stamp, 20.0, 30.0, 80.0)).await.unwrap();
        }

        let full = range("2025-03-01 10:00:00", "2025-03-01 10:05:00");
        let (records, total) = store.query_performance("h1", &full, &page(2, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(records.len(), 2);
        // DESC order: page 2 holds the 3rd and 4th newest rows.
        assert_eq!(records[0].timestamp, ts("2025-03-01 10:02:00"));
        assert_eq!(records[1].timestamp, ts("2025-03-01 10:01:00"));

        // Coerced defaults
        let coerced = PageParams { page: 0, page_size: 0 }.normalized();
        let (records, _) = store.query_performance("h1", &full, &coerced).await.unwrap();
        assert_eq!(records.len(), 5);
    }

    #[tokio::test]
    async fn test_query_trend_buckets() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        // Ten rows, ten seconds apart, spanning 90 seconds from an aligned origin.
        for i in 0..10u32 {
            let stamp = format!("2025-03-01 10:00:{:02}", i * 10 % 60);
            let stamp = if i < 6 { stamp } else { format!("2025-03-01 10:01:{:02}", (i * 10) % 60) };
            store
                .insert_performance(&perf_row("h1", &stamp, (i * 10) as f32, 30.0, 80.0))
                .await
                .unwrap();
        }

        let full = range("2025-03-01 10:00:00", "2025-03-01 10:02:00");
        let buckets = store.query_trend("h1", &full, 30).await.unwrap();
        assert_eq!(buckets.len(), 4);
        // Ascending buckets, each averaging three rows (last bucket has one).
        assert!(buckets.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(buckets[0].cpu_percent, 10.0); // avg of 0, 10, 20
        assert_eq!(buckets[1].cpu_percent, 40.0); // avg of 30, 40, 50
        assert_eq!(buckets[2].cpu_percent, 70.0); // avg of 60, 70, 80
        assert_eq!(buckets[3].cpu_percent, 90.0);
    }

    #[tokio::test]
    async fn test_query_trend_raw() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        store
            .insert_performance(&perf_row("h1", "2025-03-01 10:01:00", 40.0, 30.0, 80.0))
            .await
            .unwrap();
        store
            .insert_performance(&perf_row("h1", "2025-03-01 10:00:00", 20.0, 30.0, 80.0))
            .await
            .unwrap();

        let rows = store
            .query_trend("h1", &range("2025-03-01 10:00:00", "2025-03-01 10:02:00"), 0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        // Raw rows come back ascending.
        assert_eq!(rows[0].cpu_percent, 20.0);
        assert_eq!(rows[1].cpu_percent, 40.0);
    }

    #[tokio::test]
    async fn test_query_anomaly_source() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        let mut hot = perf_row("h1", "2025-03-01 10:00:00", 90.0, 50.0, 40.0);
        hot.rates.cpu_percent_rate = 0.2;
        store.insert_performance(&hot).await.unwrap();

        let mut spiky = perf_row("h2", "2025-03-01 10:00:10", 30.0, 50.0, 70.0);
        spiky.rates.mem_used_percent_rate = -0.8;
        store.insert_performance(&spiky).await.unwrap();

        store
            .insert_performance(&perf_row("h3", "2025-03-01 10:00:20", 30.0, 50.0, 70.0))
            .await
            .unwrap();

        let thresholds = AnomalyThresholds::default();
        let full = range("2025-03-01 10:00:00", "2025-03-01 10:01:00");

        // All hosts: the hot row and the rate spike qualify, newest first.
        let (rows, total) =
            store.query_anomaly_source("", &full, &thresholds, &page(1, 100)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].server_name, "h2");
        assert_eq!(rows[1].server_name, "h1");

        // Single host filter.
        let (rows, total) =
            store.query_anomaly_source("h1", &full, &thresholds, &page(1, 100)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].cpu_percent, 90.0);
    }

    #[tokio::test]
    async fn test_query_latest_per_host() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        store
            .insert_performance(&perf_row("h1", "2025-03-01 10:00:00", 20.0, 30.0, 85.0))
            .await
            .unwrap();
        store
            .insert_performance(&perf_row("h1", "2025-03-01 10:01:00", 40.0, 30.0, 75.0))
            .await
            .unwrap();
        store
            .insert_performance(&perf_row("h2", "2025-03-01 10:00:30", 60.0, 30.0, 55.0))
            .await
            .unwrap();

        let latest = store.query_latest_per_host().await.unwrap();
        assert_eq!(latest.len(), 2);
        let h1 = latest.iter().find(|r| r.server_name == "h1").unwrap();
        assert_eq!(h1.timestamp, ts("2025-03-01 10:01:00"));
        assert_eq!(h1.score, 75.0);
    }

    #[tokio::test]
    async fn test_net_detail_round_trip() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        let row = NetDetailRow {
            server_name: "h1".to_string(),
            net_name: "eth0".to_string(),
            timestamp: ts("2025-03-01 10:00:00"),
            counters: NetCounters {
                rcv_bytes_rate: 1000.0,
                rcv_packets_rate: 10.0,
                snd_bytes_rate: 2000.0,
                snd_packets_rate: 20.0,
                err_in: 1,
                err_out: 2,
                drop_in: 3,
                drop_out: 4,
            },
            rates: NetRates { rcv_bytes_rate_rate: 0.5, ..Default::default() },
        };
        store.insert_net_detail(&row).await.unwrap();

        let (records, total) = store
            .query_net_detail(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:00:00"),
                &page(1, 100),
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        let rec = &records[0];
        assert_eq!(rec.net_name, "eth0");
        assert_eq!(rec.err_in, 1);
        assert_eq!(rec.drop_out, 4);
        assert_eq!(rec.rcv_bytes_rate, 1000.0);
        assert_eq!(rec.snd_packets_rate, 20.0);
    }

    #[tokio::test]
    async fn test_disk_detail_round_trip() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        let row = DiskDetailRow {
            server_name: "h1".to_string(),
            disk_name: "sda".to_string(),
            timestamp: ts("2025-03-01 10:00:00"),
            reads: 100,
            writes: 200,
            sectors_read: 300,
            sectors_written: 400,
            read_time_ms: 500,
            write_time_ms: 600,
            io_in_progress: 2,
            io_time_ms: 700,
            weighted_io_time_ms: 800,
            counters: DiskCounters {
                read_bytes_per_sec: 1024.0,
                write_bytes_per_sec: 2048.0,
                read_iops: 10.0,
                write_iops: 20.0,
                avg_read_latency_ms: 1.5,
                avg_write_latency_ms: 2.5,
                util_percent: 30.0,
            },
            rates: DiskRates::default(),
        };
        store.insert_disk_detail(&row).await.unwrap();

        let (records, total) = store
            .query_disk_detail(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:00:00"),
                &page(1, 100),
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        let rec = &records[0];
        assert_eq!(rec.disk_name, "sda");
        assert_eq!(rec.read_bytes_per_sec, 1024.0);
        assert_eq!(rec.util_percent, 30.0);
    }

    #[tokio::test]
    async fn test_mem_detail_round_trip() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        let row = MemDetailRow {
            server_name: "h1".to_string(),
            timestamp: ts("2025-03-01 10:00:00"),
            counters: MemCounters {
                total: 16384.0,
                free: 4096.0,
                avail: 8192.0,
                buffers: 512.0,
                cached: 2048.0,
                active: 6000.0,
                inactive: 3000.0,
                dirty: 12.0,
                ..Default::default()
            },
            rates: MemRates::default(),
        };
        store.insert_mem_detail(&row).await.unwrap();

        let (records, total) = store
            .query_mem_detail(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:00:00"),
                &page(1, 100),
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        let rec = &records[0];
        assert_eq!(rec.total, 16384.0);
        assert_eq!(rec.buffers, 512.0);
        assert_eq!(rec.dirty, 12.0);
    }

    #[tokio::test]
    async fn test_softirq_detail_round_trip() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        let row = SoftIrqDetailRow {
            server_name: "h1".to_string(),
            cpu_name: "cpu0".to_string(),
            timestamp: ts("2025-03-01 10:00:00"),
            counters: SoftIrqCounters {
                hi: 1,
                timer: 1000,
                net_tx: 50,
                net_rx: 60,
                block: 70,
                sched: 900,
                ..Default::default()
            },
            rates: SoftIrqRates::default(),
        };
        store.insert_softirq_detail(&row).await.unwrap();

        let (records, total) = store
            .query_softirq_detail(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:00:00"),
                &page(1, 100),
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        let rec = &records[0];
        assert_eq!(rec.cpu_name, "cpu0");
        assert_eq!(rec.timer, 1000);
        assert_eq!(rec.sched, 900);
    }

    #[tokio::test]
    async fn test_cpu_core_detail_latest_per_core() {
        let store = SampleStore::connect_in_memory().await.unwrap();

        for (stamp, cpu0, cpu1) in [
            ("2025-03-01 10:00:00", 10.0f32, 20.0f32),
            ("2025-03-01 10:01:00", 30.0, 40.0),
        ] {
            for (name, pct) in [("cpu0", cpu0), ("cpu1", cpu1)] {
                store
                    .insert_cpu_core_detail(&CpuCoreDetailRow {
                        server_name: "h1".to_string(),
                        cpu_name: name.to_string(),
                        timestamp: ts(stamp),
                        cpu_percent: pct,
                        usr_percent: 0.0,
                        system_percent: 0.0,
                        nice_percent: 0.0,
                        idle_percent: 100.0 - pct,
                        io_wait_percent: 0.0,
                        irq_percent: 0.0,
                        soft_irq_percent: 0.0,
                    })
                    .await
                    .unwrap();
            }
        }

        let (records, total) = store
            .query_cpu_core_detail(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:02:00"),
                &page(1, 100),
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(records.len(), 2);
        // Latest row per core, ordered by core name.
        assert_eq!(records[0].cpu_name, "cpu0");
        assert_eq!(records[0].cpu_percent, 30.0);
        assert_eq!(records[1].cpu_name, "cpu1");
        assert_eq!(records[1].cpu_percent, 40.0);
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let store = SampleStore::connect_in_memory().await.unwrap();
        store.close().await;

        let result = store
            .query_performance(
                "h1",
                &range("2025-03-01 10:00:00", "2025-03-01 10:01:00"),
                &page(1, 100),
            )
            .await;
        assert!(matches!(result, Err(crate::error::FleetError::BackendUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let db_path =
            std::env::temp_dir().join(format!("fleetmon-test-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", db_path.display());

        {
            let store = SampleStore::connect(&url).await.unwrap();
            store
                .insert_performance(&perf_row("h1", "2025-03-01 10:00:00", 20.0, 30.0, 80.0))
                .await
                .unwrap();
            store.close().await;
        }

        {
            let store = SampleStore::connect(&url).await.unwrap();
            let (records, total) = store
                .query_performance(
                    "h1",
                    &range("2025-03-01 10:00:00", "2025-03-01 10:00:00"),
                    &page(1, 100),
                )
                .await
                .unwrap();
            assert_eq!(total, 1);
            assert_eq!(records[0].cpu_percent, 20.0);
            store.close().await;
        }

        let _ = std::fs::remove_file(&db_path);
    }
}
