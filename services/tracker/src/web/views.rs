//! services/tracker/src/web/views.rs
//!
//! Response producers for the tracked routes. They run only after the
//! tracking middleware has updated the stores.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Extension,
};
use bytes::Bytes;
use phishing_core::domain::TrackingContext;
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// A 1x1 transparent PNG.
pub const PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5,
    0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0x00, 0x00, 0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// GET /logo.png - the message was opened.
pub async fn opened() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], Bytes::from_static(PIXEL))
}

/// GET /login - a link in the message was followed. Serves the page of the
/// pool's template.
pub async fn clicked(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<TrackingContext>,
) -> Response {
    match state.pages.clicked(&context) {
        Some(page) => Html(page).into_response(),
        None => {
            error!("No clicked page for template {:?}", context.template);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /submit - the landing form was submitted.
pub async fn phished(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<TrackingContext>,
) -> Html<String> {
    Html(state.pages.phished(&context))
}

/// Every untracked path.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
