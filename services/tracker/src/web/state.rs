//! services/tracker/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::web::pages::Pages;
use phishing_core::domain::Status;
use phishing_core::ports::{PoolStore, TargetStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub targets: Arc<dyn TargetStore>,
    pub pools: Arc<dyn PoolStore>,
    pub pages: Arc<Pages>,
}

/// State of one tracked route: the shared state plus the milestone the route records.
#[derive(Clone)]
pub struct Tracker {
    pub app: Arc<AppState>,
    pub status: Status,
}

impl Tracker {
    pub fn new(app: Arc<AppState>, status: Status) -> Self {
        Self { app, status }
    }
}
