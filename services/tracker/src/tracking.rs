//! services/tracker/src/tracking.rs
//!
//! The request contract shared by every tracking route: resolve the target and
//! its pool, upgrade the target, then add the newly reached milestones to the
//! pool's counters.
//!
//! The two store operations are independent single-record transactions. The
//! milestones returned by the upgrade are passed by value into the increment,
//! so a replayed request reaches nothing new and counts nothing.
//!
//! Nothing here checks that the target actually belongs to the pool: the pair
//! is trusted as it was embedded in the link at dispatch time. Anyone holding
//! one valid target id and another pool's id can therefore cross-wire counts.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use phishing_core::domain::{Status, TrackingContext};
use phishing_core::ports::{PoolStore, PortError, TargetStore};
use tracing::{debug, error, info};

/// Why a tracked request was rejected or failed.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// Wrong method or missing identifier.
    #[error("Malformed tracking request")]
    BadRequest,
    /// An identifier does not resolve to a record.
    #[error("Unknown tracking identifier: {0}")]
    NotFound(String),
    /// A storage transaction could not complete.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<PortError> for TrackError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => TrackError::NotFound(what),
            PortError::Unavailable(why) | PortError::Invalid(why) => {
                TrackError::StoreUnavailable(why)
            }
        }
    }
}

impl IntoResponse for TrackError {
    /// Malformed requests and unknown identifiers get the same empty 404, so
    /// responses never reveal which identifiers exist.
    fn into_response(self) -> Response {
        match self {
            TrackError::BadRequest | TrackError::NotFound(_) => {
                debug!("Rejected tracking request: {}", self);
                StatusCode::NOT_FOUND.into_response()
            }
            TrackError::StoreUnavailable(_) => {
                error!("Tracking request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// The query string of a tracking link: `t` is the target id, `p` the pool id.
#[derive(Debug, Default)]
pub struct TrackingParams {
    pub t: Option<String>,
    pub p: Option<String>,
}

impl TrackingParams {
    /// Picks `t` and `p` out of decoded query pairs. A repeated key keeps its
    /// last value; other keys are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        pairs
            .into_iter()
            .fold(Self::default(), |mut params, (key, value)| {
                match key.as_str() {
                    "t" => params.t = Some(value),
                    "p" => params.p = Some(value),
                    _ => {}
                }
                params
            })
    }

    /// Returns `(target_id, pool_id)`, or `BadRequest` if either is missing.
    pub fn into_ids(self) -> Result<(String, String), TrackError> {
        match (self.t, self.p) {
            (Some(t), Some(p)) => Ok((t, p)),
            _ => Err(TrackError::BadRequest),
        }
    }
}

/// Runs one tracked request against the stores.
///
/// Both identifiers are resolved before anything is written, so an unknown
/// pool leaves the target untouched. The pool increment is skipped when the
/// upgrade reached nothing new.
pub async fn track(
    targets: &dyn TargetStore,
    pools: &dyn PoolStore,
    target_id: &str,
    pool_id: &str,
    status: Status,
    at: DateTime<Utc>,
) -> Result<TrackingContext, TrackError> {
    targets.get_target(target_id).await?;
    let pool = pools.get_pool(pool_id).await?;

    let reached = targets.upgrade(target_id, status, at).await?;
    if !reached.is_empty() {
        pools.increment_statuses(pool_id, &reached).await?;
        info!(
            "Target {} reached {:?} in pool ({}, {})",
            target_id, reached, pool.group, pool.template
        );
    }

    Ok(TrackingContext {
        target_id: target_id.to_string(),
        pool_id: pool_id.to_string(),
        group: pool.group,
        template: pool.template,
    })
}
