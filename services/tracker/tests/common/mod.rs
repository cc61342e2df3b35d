// ============================================================================
// Shared helpers for the tracker integration tests
// ============================================================================
//
// - an in-process router over a `MemoryStore`
// - `FaultyStore`, a store wrapper that can fail on demand and counts writes
// - request helpers driving the router with `tower::ServiceExt::oneshot`
//
// ============================================================================

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use phishing_core::domain::{Pool, Status, StatusSet, Target};
use phishing_core::ports::{PoolStore, PortError, PortResult, TargetStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tracker_lib::adapters::MemoryStore;
use tracker_lib::web::{self, pages::Pages, AppState};

pub fn pages() -> Pages {
    Pages::new(
        HashMap::from([(
            "bank".to_string(),
            "<form action=\"/submit?t={target_id}&p={pool_id}\">".to_string(),
        )]),
        "Gotcha, {group}!",
    )
}

pub fn router_over(targets: Arc<dyn TargetStore>, pools: Arc<dyn PoolStore>) -> Router {
    web::router(Arc::new(AppState {
        targets,
        pools,
        pages: Arc::new(pages()),
    }))
}

pub fn memory_router() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    let router = router_over(store.clone(), store.clone());
    (store, router)
}

/// A target that has been sent a message from the ("sales", template) pool,
/// exactly as dispatch leaves it.
pub async fn sent_target(store: &MemoryStore, template: &str) -> (Target, Pool) {
    let pool = store.get_or_create("sales", template).await.unwrap();
    let target = store.create_target().await.unwrap();
    let reached = store.upgrade(&target.id, Status::Sent, Utc::now()).await.unwrap();
    store.increment_statuses(&pool.id, &reached).await.unwrap();
    let target = store.get_target(&target.id).await.unwrap();
    let pool = store.get_pool(&pool.id).await.unwrap();
    (target, pool)
}

pub fn counts(pool: &Pool) -> [u64; 4] {
    Status::ALL.map(|s| pool.count(s))
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub async fn send(router: &Router, method: Method, uri: &str) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply { status, headers, body }
}

pub async fn get(router: &Router, uri: &str) -> Reply {
    send(router, Method::GET, uri).await
}

pub fn link(path: &str, target_id: &str, pool_id: &str) -> String {
    format!("{}?t={}&p={}", path, target_id, pool_id)
}

// ============================================================================
// Fault injection
// ============================================================================

/// Delegates to a `MemoryStore`, failing chosen operations with
/// `PortError::Unavailable` and counting pool increments that reach storage.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_upgrade: AtomicBool,
    pub fail_increment: AtomicBool,
    pub increments: AtomicUsize,
}

fn injected() -> PortError {
    PortError::Unavailable("injected failure".to_string())
}

#[async_trait]
impl TargetStore for FaultyStore {
    async fn create_target(&self) -> PortResult<Target> {
        self.inner.create_target().await
    }

    async fn get_target(&self, target_id: &str) -> PortResult<Target> {
        self.inner.get_target(target_id).await
    }

    async fn upgrade(
        &self,
        target_id: &str,
        new_status: Status,
        at: DateTime<Utc>,
    ) -> PortResult<StatusSet> {
        if self.fail_upgrade.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.upgrade(target_id, new_status, at).await
    }

    async fn reset_targets(&self, target_ids: &[String]) -> PortResult<u64> {
        self.inner.reset_targets(target_ids).await
    }
}

#[async_trait]
impl PoolStore for FaultyStore {
    async fn get_or_create(&self, group: &str, template: &str) -> PortResult<Pool> {
        self.inner.get_or_create(group, template).await
    }

    async fn get_pool(&self, pool_id: &str) -> PortResult<Pool> {
        self.inner.get_pool(pool_id).await
    }

    async fn increment_statuses(&self, pool_id: &str, statuses: &StatusSet) -> PortResult<()> {
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.increments.fetch_add(1, Ordering::SeqCst);
        self.inner.increment_statuses(pool_id, statuses).await
    }

    async fn reset_pools(&self, pool_ids: &[String]) -> PortResult<u64> {
        self.inner.reset_pools(pool_ids).await
    }
}
