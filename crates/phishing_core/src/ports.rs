//! crates/phishing_core/src/ports.rs
//!
//! Defines the service contracts (traits) the tracker core depends on.
//! These traits form the boundary of the hexagonal architecture: storage and
//! mail delivery live behind them, so the core never touches a database or a
//! network socket directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Pool, Status, StatusSet, Target};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The underlying store or transport could not complete the operation.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Creates a target with a fresh random id and no milestone reached.
    async fn create_target(&self) -> PortResult<Target>;

    async fn get_target(&self, target_id: &str) -> PortResult<Target>;

    /// Atomically records every milestone up to `new_status` that the target
    /// has not reached yet, all with timestamp `at`, and returns them.
    ///
    /// Concurrent calls on the same target are serialized on that record only,
    /// so no milestone is ever returned by two calls.
    async fn upgrade(
        &self,
        target_id: &str,
        new_status: Status,
        at: DateTime<Utc>,
    ) -> PortResult<StatusSet>;

    /// Clears all timestamps of the given targets. Returns how many were reset.
    async fn reset_targets(&self, target_ids: &[String]) -> PortResult<u64>;
}

#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Returns the pool for `(group, template)`, creating it on first use.
    /// Concurrent callers for the same pair get the same pool.
    async fn get_or_create(&self, group: &str, template: &str) -> PortResult<Pool>;

    async fn get_pool(&self, pool_id: &str) -> PortResult<Pool>;

    /// Adds one to each counter whose milestone is in `statuses`, without
    /// reading the counters back into the caller. An empty set writes nothing.
    async fn increment_statuses(&self, pool_id: &str, statuses: &StatusSet) -> PortResult<()>;

    /// Zeroes all counters of the given pools. Returns how many were reset.
    async fn reset_pools(&self, pool_ids: &[String]) -> PortResult<u64>;
}

//=========================================================================================
// Delivery Port
//=========================================================================================

/// A fully rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> PortResult<()>;
}
