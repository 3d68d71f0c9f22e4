//! fleetmon core library
//!
//! Ingestion, scoring, persistence, and query logic for the host-fleet
//! telemetry manager.

pub mod config;
pub mod error;
pub mod manager;
pub mod observability;
pub mod proto_convert;
pub mod query;
pub mod rate;
pub mod scoring;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use config::Settings;
pub use error::{FleetError, Result};
pub use manager::{HostManager, LiveHostEntry};
pub use observability::init as init_observability;
pub use query::QueryService;
pub use rate::RateEngine;
pub use scoring::ScoringProfile;
pub use store::SampleStore;
