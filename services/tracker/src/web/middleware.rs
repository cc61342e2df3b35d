//! services/tracker/src/web/middleware.rs
//!
//! Tracking middleware, applied identically to every tracked route.

use axum::{
    extract::{Query, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::tracking::{track, TrackError, TrackingParams};
use crate::web::state::Tracker;

/// Middleware that records the route's milestone for the target named in the
/// query string and updates its pool.
///
/// If valid, inserts the `TrackingContext` into request extensions for the
/// view to use. Anything else ends the request with an empty 404.
pub async fn track_request(
    State(tracker): State<Tracker>,
    req: Request,
    next: Next,
) -> Response {
    match enrich(&tracker, req).await {
        Ok(req) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

async fn enrich(tracker: &Tracker, mut req: Request) -> Result<Request, TrackError> {
    // 1. Only GET is tracked
    if req.method() != Method::GET {
        return Err(TrackError::BadRequest);
    }

    // 2. Extract target and pool ids
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
        .map_err(|_| TrackError::BadRequest)?;
    let (target_id, pool_id) = TrackingParams::from_pairs(pairs).into_ids()?;

    // 3. Upgrade the target and count what it newly reached
    let context = track(
        tracker.app.targets.as_ref(),
        tracker.app.pools.as_ref(),
        &target_id,
        &pool_id,
        tracker.status,
        Utc::now(),
    )
    .await?;

    // 4. Hand the context to the view
    req.extensions_mut().insert(context);
    Ok(req)
}
