//! Error types for the netwarden-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    /// Range validation failure: malformed IP, cross-subnet range,
    /// non-increasing range, or range too large. Surfaced to the
    /// scan-start caller before any probing; never retried.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// The OS probing mechanism itself is unusable (ping utility missing,
    /// permission denied). Aborts the current sweep. Per-host timeouts and
    /// unreachability are not errors; they surface as `alive = false`.
    #[error("Probe infrastructure failure: {0}")]
    ProbeInfrastructure(String),

    #[error("Store error: {0}")]
    Store(#[from] netwarden_store::StoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
