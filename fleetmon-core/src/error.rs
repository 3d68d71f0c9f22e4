//! Error types for fleetmon.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use thiserror::Error;

/// Result type alias for fleetmon operations.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Main error type for fleetmon.
#[derive(Error, Debug)]
pub enum FleetError {
    // Store lifecycle errors
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Per-row write errors; logged and swallowed on the ingest path
    #[error("write to {table} failed: {reason}")]
    WriteFailed { table: &'static str, reason: String },

    // Query errors; degraded to empty results on the read path
    #[error("read from {table} failed: {reason}")]
    ReadFailed { table: &'static str, reason: String },

    // Argument validation
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: String, end: String },

    #[error("snapshot carries no host identity")]
    EmptyHostKey,

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FleetError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }
}
