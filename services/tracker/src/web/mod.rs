pub mod middleware;
pub mod pages;
pub mod state;
pub mod views;

use axum::{
    middleware as axum_middleware,
    routing::{any, MethodRouter},
    Router,
};
use phishing_core::domain::Status;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::track_request;
pub use state::{AppState, Tracker};

/// Builds the tracking router.
///
/// Routes accept any method so that the middleware, not the router, rejects
/// non-GET requests with the same 404 as every other rejection.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(tracked(&state, "/logo.png", Status::Opened, any(views::opened)))
        .merge(tracked(&state, "/login", Status::Clicked, any(views::clicked)))
        .merge(tracked(&state, "/submit", Status::Phished, any(views::phished)))
        .fallback(views::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn tracked(
    state: &Arc<AppState>,
    path: &str,
    status: Status,
    view: MethodRouter<Arc<AppState>>,
) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, view)
        .route_layer(axum_middleware::from_fn_with_state(
            Tracker::new(state.clone(), status),
            track_request,
        ))
}
