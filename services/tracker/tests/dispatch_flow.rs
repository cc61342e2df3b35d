// ============================================================================
// Dispatch tests
// ============================================================================
//
// Campaign dispatch against the in-memory store with a scripted sender:
// - delivered messages mark their target sent and count in their pool
// - failed deliveries are reported and can be resent
// - links in delivered messages are accepted by the tracking routes
//
// ============================================================================

use async_trait::async_trait;
use axum::http::StatusCode;
use phishing_core::domain::Status;
use phishing_core::ports::{
    MessageSender, OutgoingMessage, PoolStore, PortError, PortResult, TargetStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracker_lib::adapters::MemoryStore;
use tracker_lib::dispatch::{
    assign_templates, parse_recipients, Dispatcher, MessageTemplate, Templates,
};

mod common;
use common::{counts, get, router_over};

/// Records delivered messages and fails for the addresses in `failing`.
#[derive(Default)]
struct ScriptedSender {
    failing: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<OutgoingMessage>>,
}

impl ScriptedSender {
    fn failing_for(addresses: &[&str]) -> Self {
        let sender = Self::default();
        sender
            .failing
            .lock()
            .unwrap()
            .extend(addresses.iter().map(|a| a.to_string()));
        sender
    }
}

#[async_trait]
impl MessageSender for ScriptedSender {
    async fn send(&self, message: OutgoingMessage) -> PortResult<()> {
        if self.failing.lock().unwrap().contains(&message.to) {
            return Err(PortError::Unavailable("connection refused".to_string()));
        }
        self.delivered.lock().unwrap().push(message);
        Ok(())
    }
}

fn templates() -> Templates {
    ["bank", "it"]
        .into_iter()
        .map(|name| {
            (
                name.to_string(),
                MessageTemplate {
                    subject: format!("{} notice", name),
                    from: "noreply@example.com".to_string(),
                    text: "/login?t={target_id}&p={pool_id}".to_string(),
                    html: "<img src=\"/logo.png?t={target_id}&p={pool_id}\">".to_string(),
                },
            )
        })
        .collect()
}

const RECIPIENTS: &str = "\
a@example.com,sales
b@example.com,sales
c@example.com,sales
d@example.com,it
e@example.com,it
";

async fn run_campaign(
    store: &Arc<MemoryStore>,
    sender: &Arc<ScriptedSender>,
) -> (Dispatcher, tracker_lib::dispatch::DispatchReport) {
    let dispatcher = Dispatcher::new(store.clone(), store.clone(), sender.clone(), templates());
    let groups = parse_recipients(RECIPIENTS, false).unwrap();
    let assignments = assign_templates(
        groups,
        &dispatcher.template_names(),
        &mut StdRng::seed_from_u64(42),
    );
    let report = dispatcher.send_campaign(&assignments).await.unwrap();
    (dispatcher, report)
}

#[tokio::test]
async fn test_campaign_marks_delivered_targets_sent() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(ScriptedSender::default());

    let (_, report) = run_campaign(&store, &sender).await;

    assert_eq!(report.sent, 5);
    assert!(report.failures.is_empty());
    assert_eq!(sender.delivered.lock().unwrap().len(), 5);

    let mut total_sent = 0;
    for group in ["sales", "it"] {
        for template in ["bank", "it"] {
            let pool = store.get_or_create(group, template).await.unwrap();
            assert_eq!(counts(&pool)[1..], [0, 0, 0]);
            total_sent += pool.sent_count;
        }
    }
    assert_eq!(total_sent, 5);
}

#[tokio::test]
async fn test_failed_deliveries_are_reported_and_resent() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(ScriptedSender::failing_for(&["b@example.com", "e@example.com"]));

    let (dispatcher, report) = run_campaign(&store, &sender).await;

    assert_eq!(report.sent, 3);
    let failed: HashSet<&str> = report.failures.iter().map(|f| f.address.as_str()).collect();
    assert_eq!(failed, HashSet::from(["b@example.com", "e@example.com"]));
    for failure in &report.failures {
        let target = store.get_target(&failure.target_id).await.unwrap();
        assert_eq!(target.furthest(), None);
    }

    sender.failing.lock().unwrap().clear();
    let retry = dispatcher.resend(&report.failures).await.unwrap();

    assert_eq!(retry.sent, 2);
    assert!(retry.failures.is_empty());
    for failure in &report.failures {
        let target = store.get_target(&failure.target_id).await.unwrap();
        assert_eq!(target.furthest(), Some(Status::Sent));
        assert!(store.get_pool(&failure.pool_id).await.unwrap().sent_count >= 1);
    }
}

#[tokio::test]
async fn test_delivered_links_track_back_to_their_pool() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(ScriptedSender::default());
    run_campaign(&store, &sender).await;
    let router = router_over(store.clone(), store.clone());

    let message = sender.delivered.lock().unwrap()[0].clone();
    let query = message.text.split('?').nth(1).unwrap().to_string();
    let pool_id = query.split("p=").nth(1).unwrap().to_string();
    let before = store.get_pool(&pool_id).await.unwrap();

    let reply = get(&router, &format!("/logo.png?{}", query)).await;

    assert_eq!(reply.status, StatusCode::OK);
    let after = store.get_pool(&pool_id).await.unwrap();
    assert_eq!(after.opened_count, before.opened_count + 1);
    assert_eq!(after.sent_count, before.sent_count);
}
