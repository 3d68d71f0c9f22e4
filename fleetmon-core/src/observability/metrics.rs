//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - plain gauges for instantaneous values

use metrics::{describe_counter, describe_gauge};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Ingest path
    describe_counter!("fleetmon_ingest_total", "Snapshots accepted from worker agents");
    describe_counter!(
        "fleetmon_ingest_dropped_total",
        "Snapshots dropped for missing host identity"
    );
    describe_gauge!("fleetmon_scoreboard_hosts", "Hosts currently on the live scoreboard");

    // Store
    describe_counter!(
        "fleetmon_db_errors_total",
        "Failed store operations (by table, kind)"
    );

    // Query path
    describe_counter!(
        "fleetmon_query_requests_total",
        "Query service requests (by method)"
    );
}
