//! Failures raised below the application layer: startup wiring, the
//! database pool, and the logging subsystem. Request-path persistence
//! failures travel as `RepoError` instead; this type covers what breaks
//! before a request ever reaches the cache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// Pool construction, migration, or connectivity trouble.
    #[error("database unavailable: {message}")]
    Database { message: String },
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
    /// Settings that parsed but cannot run the service (missing database
    /// url, unbindable address).
    #[error("invalid service configuration: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
