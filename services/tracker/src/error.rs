//! services/tracker/src/error.rs
//!
//! Defines the primary error type for the tracker service binaries.

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use phishing_core::ports::PortError;

/// The primary error type for the `tracker` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Represents a campaign that could not be prepared or dispatched.
    #[error("Dispatch Error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
