//! Notification delivery integration tests.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use carrier::{
    AlwaysOnline, CarrierConfig, DocumentStoreExt, InMemoryDocumentStore, Notification, NotificationKind,
    NotificationService, Reconciler, RideError,
};
use support::{reconciler, Harness};

const LAG: Duration = Duration::from_millis(1500);

fn lagging_reconciler() -> Reconciler {
    Reconciler::from_config(&CarrierConfig::default())
}

async fn deliver_many(service: &NotificationService, recipient: &str, count: usize) {
    for i in 0..count {
        service
            .deliver(recipient, &format!("req-{}", i), NotificationKind::OfferReceived)
            .await
            .unwrap();
    }
}

// =============================================================================
// Paging past the store limit
// =============================================================================

#[tokio::test]
async fn fifteen_notifications_past_a_page_of_ten() {
    let harness = Harness::new();
    deliver_many(&harness.notifications, "rachel", 15).await;
    deliver_many(&harness.notifications, "dave", 2).await;

    assert_eq!(harness.notifications.fetch("rachel").await.len(), 15);
    assert_eq!(harness.notifications.clear_all("rachel").await.unwrap(), 15);
    assert!(harness.notifications.fetch("rachel").await.is_empty());
    assert_eq!(harness.notifications.fetch("dave").await.len(), 2);
}

#[tokio::test]
async fn small_pages_still_reach_every_record() {
    let store = InMemoryDocumentStore::from_config(&CarrierConfig::new().with_page_limit(3));
    let service = NotificationService::new(Arc::new(store), Arc::new(AlwaysOnline));
    deliver_many(&service, "rachel", 10).await;

    assert_eq!(service.fetch("rachel").await.len(), 10);
    assert_eq!(service.clear_all("rachel").await.unwrap(), 10);
    assert!(service.fetch("rachel").await.is_empty());
}

// =============================================================================
// Eventual consistency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn lagging_fetch_converges_within_budget() {
    let harness = Harness::lagging(LAG);
    deliver_many(&harness.notifications, "rachel", 15).await;

    // writes are acknowledged but not yet indexed
    assert!(harness.notifications.fetch("rachel").await.is_empty());

    let outcome = lagging_reconciler()
        .poll(
            || harness.notifications.try_fetch("rachel"),
            |feed| feed.len() == 15,
        )
        .await;
    assert!(outcome.converged);
    assert!(outcome.attempts > 1);
}

#[tokio::test(start_paused = true)]
async fn lagging_clear_reconciles_to_zero() {
    let harness = Harness::lagging(LAG);
    deliver_many(&harness.notifications, "rachel", 15).await;
    tokio::time::advance(LAG).await;
    assert_eq!(harness.notifications.fetch("rachel").await.len(), 15);

    assert_eq!(harness.notifications.clear_all("rachel").await.unwrap(), 15);
    // deleted records linger in queries for a while
    assert_eq!(harness.notifications.fetch("rachel").await.len(), 15);

    let feed = lagging_reconciler()
        .poll(
            || harness.notifications.try_fetch("rachel"),
            |feed| feed.is_empty(),
        )
        .await
        .into_result()
        .unwrap();
    assert!(feed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_is_soft() {
    let harness = Harness::lagging(Duration::from_secs(60));
    deliver_many(&harness.notifications, "rachel", 1).await;

    let outcome = lagging_reconciler()
        .poll(
            || harness.notifications.try_fetch("rachel"),
            |feed| !feed.is_empty(),
        )
        .await;
    assert!(!outcome.converged);
    assert_eq!(outcome.value, Some(Vec::new()));
    assert!(matches!(
        outcome.into_result(),
        Err(RideError::ConsistencyTimeout { attempts: 6 })
    ));
}

#[tokio::test(start_paused = true)]
async fn clearing_an_empty_feed_succeeds() {
    let harness = Harness::lagging(LAG);
    assert_eq!(harness.notifications.clear_all("nobody").await.unwrap(), 0);
    assert_eq!(harness.notifications.clear_all("nobody").await.unwrap(), 0);
    assert!(harness.notifications.fetch("nobody").await.is_empty());
}

// =============================================================================
// Ordering and read state
// =============================================================================

#[tokio::test]
async fn feed_is_unread_first_then_newest() {
    let harness = Harness::new();
    let store = &harness.store;
    let base = SystemTime::now() - Duration::from_secs(3600);

    for (i, minutes) in [5u64, 40, 20, 55].iter().enumerate() {
        let n = Notification::new("rachel", format!("req-{}", i), NotificationKind::OfferReceived)
            .with_created_at(base + Duration::from_secs(minutes * 60));
        store.insert_record(&n).await.unwrap();
    }

    let mut feed = harness.notifications.fetch("rachel").await;
    let ids: Vec<_> = feed.iter().map(|n| n.request_id.clone()).collect();
    assert_eq!(ids, vec!["req-3", "req-1", "req-2", "req-0"]);

    // read the newest; it drops behind every unread one
    harness.notifications.mark_read(&mut feed[0]).await.unwrap();
    let ids: Vec<_> = harness
        .notifications
        .fetch("rachel")
        .await
        .iter()
        .map(|n| (n.request_id.clone(), n.read))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("req-1".to_string(), false),
            ("req-2".to_string(), false),
            ("req-0".to_string(), false),
            ("req-3".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn mark_read_twice_stays_read() {
    let harness = Harness::new();
    let mut n = harness
        .notifications
        .deliver("rachel", "req-1", NotificationKind::OfferReceived)
        .await
        .unwrap();

    harness.notifications.mark_read(&mut n).await.unwrap();
    harness.notifications.mark_read(&mut n).await.unwrap();
    assert!(n.read);
    assert!(!harness.notifications.has_unread("rachel").await);
}

#[tokio::test]
async fn unacknowledged_mark_read_stays_unread() {
    let harness = Harness::new();
    let mut n = harness
        .notifications
        .deliver("rachel", "req-1", NotificationKind::OfferReceived)
        .await
        .unwrap();

    harness.store.set_reachable(false);
    let err = harness.notifications.mark_read(&mut n).await.unwrap_err();
    assert!(matches!(err, RideError::StoreUnavailable(_)));
    assert!(!n.read);

    harness.store.set_reachable(true);
    assert!(harness.notifications.fetch("rachel").await.iter().all(|n| !n.read));
}

#[tokio::test]
async fn mark_all_read_counts_what_it_marked() {
    let harness = Harness::new();
    deliver_many(&harness.notifications, "rachel", 12).await;
    let mut feed = harness.notifications.fetch("rachel").await;
    harness.notifications.mark_read(&mut feed[0]).await.unwrap();

    assert_eq!(harness.notifications.mark_all_read("rachel").await.unwrap(), 11);
    assert!(!harness.notifications.has_unread("rachel").await);
}

// =============================================================================
// Connectivity
// =============================================================================

#[tokio::test]
async fn offline_notify_is_dropped_not_queued() {
    let harness = Harness::new();
    harness.store.set_reachable(false);
    let local = harness
        .notifications
        .notify("rachel", "req-1", NotificationKind::OfferReceived);
    assert!(!local.read);

    harness.store.set_reachable(true);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(harness.notifications.fetch("rachel").await.is_empty());
}

#[tokio::test]
async fn failed_background_write_does_not_block_the_transition() {
    let harness = Harness::new();
    let mut request = harness.lifecycle.create(support::draft("rachel")).unwrap();

    // reachable when checked, gone by the time the spawned write runs
    harness.lifecycle.submit_offer(&mut request, "dave").unwrap();
    harness.store.set_reachable(false);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    harness.store.set_reachable(true);

    assert_eq!(request.status(), carrier::RequestStatus::Offered);
    assert!(harness.notifications.fetch("rachel").await.is_empty());
}

#[tokio::test]
async fn fetch_serves_last_good_feed_while_offline() {
    let harness = Harness::new();
    deliver_many(&harness.notifications, "rachel", 3).await;
    let online = reconciler()
        .poll(
            || harness.notifications.try_fetch("rachel"),
            |feed| feed.len() == 3,
        )
        .await
        .into_result()
        .unwrap();

    harness.store.set_reachable(false);
    assert_eq!(harness.notifications.fetch("rachel").await, online);
    assert!(harness.notifications.try_fetch("rachel").await.is_err());
    assert!(harness.notifications.clear_all("rachel").await.is_err());
    assert_eq!(harness.notifications.fetch("rachel").await.len(), 3);
}
