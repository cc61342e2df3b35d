// ============================================================================
// Concurrency tests
// ============================================================================
//
// Concurrent upgrades of one target never report a milestone twice, and
// concurrent increments of one pool never lose an update.
//
// ============================================================================

use axum::http::StatusCode;
use chrono::Utc;
use futures::future::join_all;
use phishing_core::domain::{Status, StatusSet};
use phishing_core::ports::{PoolStore, TargetStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracker_lib::adapters::MemoryStore;

mod common;
use common::{counts, get, link, memory_router, sent_target};

const TASKS: usize = 64;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_upgrades_report_each_milestone_once() {
    let store = Arc::new(MemoryStore::new());
    let target = store.create_target().await.unwrap();
    let requested: Vec<Status> = (0..TASKS)
        .map(|i| Status::ALL[i % (Status::ALL.len() - 1)])
        .collect();

    let handles = requested.iter().map(|status| {
        let store = store.clone();
        let id = target.id.clone();
        let status = *status;
        tokio::spawn(async move { store.upgrade(&id, status, Utc::now()).await.unwrap() })
    });
    let diffs: Vec<StatusSet> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let highest = requested.iter().max().copied().unwrap();
    let mut seen = HashSet::new();
    for diff in &diffs {
        for status in diff {
            assert!(seen.insert(*status), "{} reported twice", status);
        }
    }
    let expected: HashSet<Status> = highest.and_below().collect();
    assert_eq!(seen, expected);
    assert_eq!(
        store.get_target(&target.id).await.unwrap().furthest(),
        Some(highest)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_increments_lose_nothing() {
    let store = Arc::new(MemoryStore::new());
    let pool = store.get_or_create("accounting", "weird").await.unwrap();
    let opened_clicked: StatusSet = [Status::Opened, Status::Clicked].into_iter().collect();
    let phished: StatusSet = [Status::Phished].into_iter().collect();

    let handles = (0..TASKS).map(|i| {
        let store = store.clone();
        let id = pool.id.clone();
        let statuses = if i % 2 == 0 { opened_clicked.clone() } else { phished.clone() };
        tokio::spawn(async move { store.increment_statuses(&id, &statuses).await.unwrap() })
    });
    for result in join_all(handles).await {
        result.unwrap();
    }

    let half = (TASKS / 2) as u64;
    assert_eq!(
        counts(&store.get_pool(&pool.id).await.unwrap()),
        [0, half, half, half]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_pool_creation_yields_one_pool() {
    let store = Arc::new(MemoryStore::new());

    let handles = (0..TASKS).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.get_or_create("it", "bank").await.unwrap().id })
    });
    let ids: HashSet<String> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(ids.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_requests_count_each_target_once() {
    let (store, router) = memory_router();
    let (target, pool) = sent_target(&store, "bank").await;
    let paths = ["/logo.png", "/login", "/submit"];

    let handles = (0..TASKS).map(|i| {
        let router = router.clone();
        let uri = link(paths[i % paths.len()], &target.id, &pool.id);
        tokio::spawn(async move { get(&router, &uri).await.status })
    });
    for status in join_all(handles).await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    assert_eq!(counts(&store.get_pool(&pool.id).await.unwrap()), [1, 1, 1, 1]);
}
