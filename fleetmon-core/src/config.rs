//! Configuration management.
//!
//! Settings resolve in order: compiled-in defaults, an optional JSON
//! settings file, then `FLEETMON_*` environment overrides. The daemon's
//! positional listen-address argument wins over all of these.

use crate::error::{FleetError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// gRPC listen address.
    pub listen_addr: String,
    /// Backend database URL.
    pub database_url: String,
    /// Scoreboard entries older than this are OFFLINE and get evicted.
    pub liveness_ttl_secs: u64,
    /// Sweeper wake interval.
    pub sweep_interval_secs: u64,
    /// Prometheus exporter port.
    pub metrics_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),
            database_url: "sqlite://fleetmon.db".to_string(),
            liveness_ttl_secs: 60,
            sweep_interval_secs: 60,
            metrics_port: 9464,
        }
    }
}

impl Settings {
    /// Load settings from an optional file and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| FleetError::InvalidConfig {
                        reason: format!("failed to read {}: {}", path.display(), e),
                    })?;
                serde_json::from_str(&content).map_err(|e| FleetError::InvalidConfig {
                    reason: format!("failed to parse {}: {}", path.display(), e),
                })?
            }
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("FLEETMON_LISTEN_ADDR") {
            self.listen_addr = value;
        }
        if let Ok(value) = std::env::var("FLEETMON_DATABASE_URL") {
            self.database_url = value;
        }
        if let Ok(value) = std::env::var("FLEETMON_LIVENESS_TTL_SECS") {
            match value.parse() {
                Ok(secs) => self.liveness_ttl_secs = secs,
                Err(_) => warn!("ignoring malformed FLEETMON_LIVENESS_TTL_SECS: {value}"),
            }
        }
        if let Ok(value) = std::env::var("FLEETMON_SWEEP_INTERVAL_SECS") {
            match value.parse() {
                Ok(secs) => self.sweep_interval_secs = secs,
                Err(_) => warn!("ignoring malformed FLEETMON_SWEEP_INTERVAL_SECS: {value}"),
            }
        }
        if let Ok(value) = std::env::var("FLEETMON_METRICS_PORT") {
            match value.parse() {
                Ok(port) => self.metrics_port = port,
                Err(_) => warn!("ignoring malformed FLEETMON_METRICS_PORT: {value}"),
            }
        }
    }

    pub fn liveness_ttl(&self) -> Duration {
        Duration::from_secs(self.liveness_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.listen_addr, "0.0.0.0:50051");
        assert_eq!(settings.liveness_ttl(), Duration::from_secs(60));
        assert_eq!(settings.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_round_trip_through_json() {
        let settings = Settings { listen_addr: "127.0.0.1:9000".to_string(), ..Default::default() };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.listen_addr, "127.0.0.1:9000");
        assert_eq!(parsed.database_url, settings.database_url);
    }
}
