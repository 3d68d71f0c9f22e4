//! End-to-end ingest and query pipeline tests: push snapshots through the
//! HostManager, then read them back through the QueryService.

use std::sync::Arc;
use std::time::Duration;

use fleetmon_api::fleetmon::v1::{
    CpuLoad, CpuStat, DiskInfo, HostInfo, MemInfo, MonitorInfo, NetInfo, SoftIrq,
};
use fleetmon_core::types::{now_wallclock, AnomalyThresholds, PageParams, TimeRange};
use fleetmon_core::{FleetError, HostManager, QueryService, SampleStore, ScoringProfile};

fn snapshot(hostname: &str, ip: &str, cpu_percent: f32) -> MonitorInfo {
    let mut cpu_stat = vec![CpuStat {
        cpu_name: "cpu".to_string(),
        cpu_percent,
        usr_percent: cpu_percent * 0.7,
        system_percent: cpu_percent * 0.2,
        idle_percent: 100.0 - cpu_percent,
        ..Default::default()
    }];
    for i in 0..4 {
        cpu_stat.push(CpuStat {
            cpu_name: format!("cpu{i}"),
            cpu_percent,
            idle_percent: 100.0 - cpu_percent,
            ..Default::default()
        });
    }

    MonitorInfo {
        host_info: Some(HostInfo {
            hostname: hostname.to_string(),
            ip_address: ip.to_string(),
        }),
        cpu_stat,
        cpu_load: Some(CpuLoad { load_avg_1: 2.0, load_avg_3: 1.5, load_avg_15: 1.0 }),
        mem_info: Some(MemInfo {
            total: 16384.0,
            free: 4096.0,
            avail: 8192.0,
            used_percent: 40.0,
            ..Default::default()
        }),
        net_info: vec![NetInfo {
            name: "eth0".to_string(),
            rcv_rate: 1e6,
            send_rate: 1e6,
            rcv_packets_rate: 100.0,
            send_packets_rate: 80.0,
            err_in: 1,
            drop_in: 2,
            ..Default::default()
        }],
        disk_info: vec![DiskInfo {
            name: "sda".to_string(),
            reads: 1000,
            writes: 2000,
            read_bytes_per_sec: 4096.0,
            write_bytes_per_sec: 8192.0,
            util_percent: 10.0,
            ..Default::default()
        }],
        soft_irq: vec![
            SoftIrq { cpu: "cpu0".to_string(), timer: 500, net_rx: 100, ..Default::default() },
            SoftIrq { cpu: "cpu1".to_string(), timer: 400, net_rx: 90, ..Default::default() },
        ],
        ..Default::default()
    }
}

fn around_now() -> TimeRange {
    let now = now_wallclock();
    TimeRange::new(now - chrono::Duration::minutes(5), now + chrono::Duration::minutes(5))
}

async fn setup() -> (Arc<SampleStore>, Arc<HostManager>, QueryService) {
    let store = Arc::new(SampleStore::connect_in_memory().await.unwrap());
    let manager = HostManager::new(store.clone(), Duration::from_secs(60), Duration::from_secs(60));
    let service = QueryService::new(store.clone(), Duration::from_secs(60));
    (store, manager, service)
}

#[tokio::test]
async fn test_first_push_populates_scoreboard_and_store() {
    let (_store, manager, service) = setup().await;

    let info = snapshot("web1", "10.0.0.1", 50.0);
    let expected_score =
        fleetmon_core::scoring::score_snapshot(&info, ScoringProfile::Balanced);
    manager.ingest(info).await.unwrap();

    // Scoreboard holds the entry with the receive timestamp.
    let scores = manager.get_all_host_scores().await;
    assert_eq!(scores.len(), 1);
    let entry = scores.get("web1_10.0.0.1").unwrap();
    assert!((entry.score - expected_score).abs() < 1e-9);
    assert!((now_wallclock() - entry.timestamp).num_seconds() <= 2);

    // One performance row, all rates zero on first sight.
    let page = service
        .query_performance("web1_10.0.0.1", around_now(), PageParams::default(), None)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.score_basis, "stored");
    let rec = &page.records[0];
    assert_eq!(rec.cpu_percent, 50.0);
    assert_eq!(rec.cpu_percent_rate, 0.0);
    assert_eq!(rec.send_rate_rate, 0.0);
    assert!((rec.score as f64 - expected_score).abs() < 0.01);
    // Wire bytes/s land as KB/s columns.
    assert!((rec.rcv_rate - 1e6 / 1024.0).abs() < 0.5);
}

#[tokio::test]
async fn test_ingest_fans_out_detail_rows() {
    let (_store, manager, service) = setup().await;

    manager.ingest(snapshot("web1", "10.0.0.1", 30.0)).await.unwrap();

    let host = "web1_10.0.0.1";
    let range = around_now();
    let page = PageParams::default();

    let net = service.query_net_detail(host, range, page).await.unwrap();
    assert_eq!(net.total_count, 1);
    assert_eq!(net.records[0].net_name, "eth0");
    assert_eq!(net.records[0].err_in, 1);

    let disk = service.query_disk_detail(host, range, page).await.unwrap();
    assert_eq!(disk.total_count, 1);
    assert_eq!(disk.records[0].disk_name, "sda");

    let mem = service.query_mem_detail(host, range, page).await.unwrap();
    assert_eq!(mem.total_count, 1);
    assert_eq!(mem.records[0].total, 16384.0);

    let softirq = service.query_softirq_detail(host, range, page).await.unwrap();
    assert_eq!(softirq.total_count, 2);

    // One row per per-core entry; the aggregate line is skipped.
    let cores = service.query_cpu_core_detail(host, range, page).await.unwrap();
    assert_eq!(cores.total_count, 4);
    assert_eq!(cores.records[0].cpu_name, "cpu0");
}

#[tokio::test]
async fn test_ingest_rejects_empty_identity() {
    let (_store, manager, service) = setup().await;

    let result = manager.ingest(MonitorInfo::default()).await;
    assert!(matches!(result, Err(FleetError::EmptyHostKey)));
    assert!(manager.get_all_host_scores().await.is_empty());

    let latest = service.query_latest_score(None).await.unwrap();
    assert!(latest.servers.is_empty());
}

#[tokio::test]
async fn test_second_push_computes_rates_and_anomalies() {
    let (_store, manager, service) = setup().await;

    manager.ingest(snapshot("web1", "10.0.0.1", 50.0)).await.unwrap();
    manager.ingest(snapshot("web1", "10.0.0.1", 100.0)).await.unwrap();

    let host = "web1_10.0.0.1";
    let page = service
        .query_performance(host, around_now(), PageParams::default(), None)
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    // cpu doubled, so the second row's change rate is (100-50)/50.
    let hot = page.records.iter().find(|r| r.cpu_percent == 100.0).unwrap();
    assert_eq!(hot.cpu_percent_rate, 1.0);

    let anomalies = service
        .query_anomaly(host, around_now(), AnomalyThresholds::default(), PageParams::default())
        .await
        .unwrap();
    // Only the second row breaches: cpu above threshold plus the rate spike.
    assert_eq!(anomalies.total_count, 1);
    assert_eq!(anomalies.anomalies.len(), 2);
    let types: Vec<&str> =
        anomalies.anomalies.iter().map(|a| a.anomaly_type.as_str()).collect();
    assert_eq!(types, vec!["CPU_HIGH", "RATE_SPIKE"]);
    assert_eq!(anomalies.anomalies[0].value, 100.0);
}

#[tokio::test]
async fn test_identical_pushes_yield_zero_rates() {
    let (_store, manager, service) = setup().await;

    manager.ingest(snapshot("web1", "10.0.0.1", 30.0)).await.unwrap();
    manager.ingest(snapshot("web1", "10.0.0.1", 30.0)).await.unwrap();

    let page = service
        .query_performance("web1_10.0.0.1", around_now(), PageParams::default(), None)
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    let newest = &page.records[0];
    assert_eq!(newest.cpu_percent_rate, 0.0);
    assert_eq!(newest.mem_used_percent_rate, 0.0);
    assert_eq!(newest.disk_util_percent_rate, 0.0);
    assert_eq!(newest.load_avg_1_rate, 0.0);
    assert_eq!(newest.send_rate_rate, 0.0);
    assert_eq!(newest.rcv_rate_rate, 0.0);
}

#[tokio::test]
async fn test_sweeper_evicts_stale_entries() {
    let store = Arc::new(SampleStore::connect_in_memory().await.unwrap());
    // TTL zero: anything a second old is stale. Fast sweep cadence.
    let manager =
        HostManager::new(store.clone(), Duration::from_secs(0), Duration::from_millis(100));
    manager.start();

    manager.ingest(snapshot("web1", "10.0.0.1", 20.0)).await.unwrap();
    assert_eq!(manager.get_all_host_scores().await.len(), 1);

    // Wait out the TTL plus a sweep cycle.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(manager.get_all_host_scores().await.is_empty());
    manager.stop();

    // The store still serves the host, now OFFLINE for a zero TTL.
    let service = QueryService::new(store, Duration::from_secs(0));
    let latest = service.query_latest_score(None).await.unwrap();
    assert_eq!(latest.servers.len(), 1);
    assert_eq!(latest.stats.offline_servers, 1);
    assert_eq!(latest.stats.online_servers, 0);
}

#[tokio::test]
async fn test_best_host_tracks_scoreboard() {
    let (_store, manager, _service) = setup().await;

    assert_eq!(manager.get_best_host().await, "");

    manager.ingest(snapshot("busy", "10.0.0.2", 95.0)).await.unwrap();
    manager.ingest(snapshot("idle", "10.0.0.3", 5.0)).await.unwrap();

    assert_eq!(manager.get_best_host().await, "idle_10.0.0.3");
}

#[tokio::test]
async fn test_rank_after_mixed_pushes() {
    let (_store, manager, service) = setup().await;

    manager.ingest(snapshot("a", "10.0.0.1", 90.0)).await.unwrap();
    manager.ingest(snapshot("b", "10.0.0.2", 10.0)).await.unwrap();
    manager.ingest(snapshot("c", "10.0.0.3", 50.0)).await.unwrap();

    let rank = service
        .query_score_rank(
            fleetmon_core::types::SortOrder::Desc,
            PageParams { page: 1, page_size: 2 },
            None,
        )
        .await
        .unwrap();
    assert_eq!(rank.total_count, 3);
    assert_eq!(rank.servers.len(), 2);
    assert_eq!(rank.servers[0].server_name, "b_10.0.0.2");
    assert!(rank.servers[0].score > rank.servers[1].score);
}
