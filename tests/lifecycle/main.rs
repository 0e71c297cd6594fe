//! Request lifecycle integration tests.

#[path = "../support/mod.rs"]
mod support;

use std::collections::HashSet;
use std::sync::Arc;

use carrier::{
    Notification, NotificationKind, Request, RequestStatus, RideError, RideResult,
};
use support::{draft, reconciler, Harness};

async fn settled_feed(harness: &Harness, recipient: &str, expected: usize) -> Vec<Notification> {
    reconciler()
        .poll(
            || harness.notifications.try_fetch(recipient),
            |feed| feed.len() == expected,
        )
        .await
        .into_result()
        .unwrap()
}

// =============================================================================
// Rider, two drivers
// =============================================================================

#[tokio::test]
async fn rider_with_two_competing_drivers() {
    let harness = Harness::new();
    let lifecycle = &harness.lifecycle;

    let mut request = lifecycle.create(draft("rachel")).unwrap();
    assert_eq!(request.status(), RequestStatus::Open);

    lifecycle.submit_offer(&mut request, "dave").unwrap();
    assert_eq!(request.status(), RequestStatus::Offered);
    let feed = settled_feed(&harness, "rachel", 1).await;
    assert!(!feed[0].read);
    assert_eq!(feed[0].kind, NotificationKind::OfferReceived);

    lifecycle.submit_offer(&mut request, "erin").unwrap();
    assert_eq!(request.status(), RequestStatus::Offered);
    let feed = settled_feed(&harness, "rachel", 2).await;
    assert!(feed.iter().all(|n| !n.read));
    assert!(feed.iter().all(|n| n.request_id == request.id()));

    lifecycle.confirm_driver(&mut request, "dave").unwrap();
    assert_eq!(request.status(), RequestStatus::Confirmed);
    let feed = settled_feed(&harness, "dave", 1).await;
    assert_eq!(feed[0].kind, NotificationKind::OfferAccepted);

    let err = lifecycle.confirm_driver(&mut request, "erin").unwrap_err();
    assert!(matches!(err, RideError::AlreadyConfirmed { .. }));
    assert_eq!(request.confirmed_driver(), Some("dave"));
}

#[tokio::test]
async fn forward_path_to_paid() {
    let harness = Harness::new();
    let lifecycle = &harness.lifecycle;

    let mut request = lifecycle.create(draft("rachel")).unwrap();
    lifecycle.submit_offer(&mut request, "dave").unwrap();
    lifecycle.confirm_driver(&mut request, "dave").unwrap();
    assert_eq!(
        lifecycle.complete(&mut request).unwrap().status(),
        RequestStatus::Complete
    );
    assert_eq!(lifecycle.pay(&mut request).unwrap().status(), RequestStatus::Paid);

    for result in [
        lifecycle.cancel(&mut request).map(|_| ()),
        lifecycle.complete(&mut request).map(|_| ()),
        lifecycle.submit_offer(&mut request, "erin").map(|_| ()),
    ] {
        assert!(matches!(result, Err(RideError::InvalidTransition { .. })));
    }
    assert_eq!(request.status(), RequestStatus::Paid);
}

// =============================================================================
// Rejections are silent
// =============================================================================

#[tokio::test]
async fn rejected_transitions_notify_nobody() {
    let harness = Harness::new();
    let lifecycle = &harness.lifecycle;

    let mut request = lifecycle.create(draft("rachel")).unwrap();
    lifecycle.submit_offer(&mut request, "dave").unwrap();
    settled_feed(&harness, "rachel", 1).await;

    assert!(matches!(
        lifecycle.submit_offer(&mut request, "dave"),
        Err(RideError::DuplicateOffer { .. })
    ));
    assert!(matches!(
        lifecycle.confirm_driver(&mut request, "frank"),
        Err(RideError::UnknownOffer { .. })
    ));
    let version = request.entity.version();

    // give any stray background write a chance to land
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(harness.notifications.fetch("rachel").await.len(), 1);
    assert!(harness.notifications.fetch("frank").await.is_empty());
    assert_eq!(request.entity.version(), version);
}

#[tokio::test]
async fn invalid_draft_writes_nothing() {
    let harness = Harness::new();
    let err = harness
        .lifecycle
        .create(draft("rachel").fare(carrier::UNESTIMATED_FARE))
        .unwrap_err();
    assert!(matches!(err, RideError::Validation { field: "fare", .. }));

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(harness.store.live_count("requests").unwrap(), 0);
}

#[tokio::test]
async fn cancelled_request_is_terminal() {
    let harness = Harness::new();
    let lifecycle = &harness.lifecycle;

    let mut request = lifecycle.create(draft("rachel")).unwrap();
    lifecycle.submit_offer(&mut request, "dave").unwrap();
    lifecycle.confirm_driver(&mut request, "dave").unwrap();
    lifecycle.cancel(&mut request).unwrap();

    let attempts: Vec<RideResult<()>> = vec![
        lifecycle.submit_offer(&mut request, "erin").map(|_| ()),
        lifecycle.confirm_driver(&mut request, "dave").map(|_| ()),
        lifecycle.complete(&mut request).map(|_| ()),
        lifecycle.pay(&mut request).map(|_| ()),
        lifecycle.cancel(&mut request).map(|_| ()),
    ];
    for attempt in attempts {
        assert!(matches!(
            attempt,
            Err(RideError::InvalidTransition {
                status: RequestStatus::Cancelled,
                ..
            })
        ));
    }
}

// =============================================================================
// Status never regresses
// =============================================================================

fn request_in(harness: &Harness, status: RequestStatus) -> Request {
    let lifecycle = &harness.lifecycle;
    let mut request = lifecycle.create(draft("rachel")).unwrap();
    let steps: &[fn(&Harness, &mut Request)] = &[
        |h, r| {
            h.lifecycle.submit_offer(r, "dave").unwrap();
        },
        |h, r| {
            h.lifecycle.confirm_driver(r, "dave").unwrap();
        },
        |h, r| {
            h.lifecycle.complete(r).unwrap();
        },
        |h, r| {
            h.lifecycle.pay(r).unwrap();
        },
    ];
    match status.progress() {
        Some(progress) => {
            for step in &steps[..progress as usize] {
                step(harness, &mut request);
            }
        }
        None => {
            lifecycle.cancel(&mut request).unwrap();
        }
    }
    assert_eq!(request.status(), status);
    request
}

#[test]
fn no_operation_moves_status_backwards() {
    let harness = Harness::new();
    for status in RequestStatus::ALL {
        let operations: [fn(&Harness, &mut Request) -> RideResult<()>; 5] = [
            |h, r| h.lifecycle.submit_offer(r, "erin").map(|_| ()),
            |h, r| h.lifecycle.confirm_driver(r, "dave").map(|_| ()),
            |h, r| h.lifecycle.complete(r).map(|_| ()),
            |h, r| h.lifecycle.pay(r).map(|_| ()),
            |h, r| h.lifecycle.cancel(r).map(|_| ()),
        ];
        for operation in operations {
            let mut request = request_in(&harness, status);
            let before = request.status();
            match operation(&harness, &mut request) {
                Ok(()) => match (before.progress(), request.status().progress()) {
                    (Some(from), Some(to)) => assert!(to >= from, "{} -> {}", before, request.status()),
                    (Some(_), None) => assert!(before.can_cancel()),
                    (None, _) => panic!("left terminal status {}", before),
                },
                Err(err) => {
                    assert!(err.is_guard_violation(), "{}", err);
                    assert_eq!(request.status(), before);
                }
            }
        }
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_offers_all_succeed() {
    let harness = Arc::new(Harness::new());
    let request = harness.lifecycle.create(draft("rachel")).unwrap();

    let drivers: Vec<String> = (0..6).map(|i| format!("driver-{}", i)).collect();
    let tasks: Vec<_> = drivers
        .iter()
        .cloned()
        .map(|driver| {
            let harness = Arc::clone(&harness);
            let mut copy = request.clone();
            tokio::spawn(async move {
                harness
                    .lifecycle
                    .submit_offer(&mut copy, &driver)
                    .map(|r| r.status())
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), RequestStatus::Offered);
    }

    let offers: HashSet<String> = harness
        .lifecycle
        .ledger()
        .offers_for(request.id())
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(offers, drivers.into_iter().collect::<HashSet<_>>());
    settled_feed(&harness, "rachel", 6).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_offers_all_reach_the_store() {
    let harness = Arc::new(Harness::new());
    let request = harness.lifecycle.create(draft("rachel")).unwrap();

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let harness = Arc::clone(&harness);
            let mut copy = request.clone();
            tokio::spawn(async move {
                harness
                    .lifecycle
                    .submit_offer(&mut copy, &format!("driver-{}", i))
                    .map(|_| ())
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let id = request.id().to_string();
    let stored = reconciler()
        .poll(
            || harness.repository.get(&id),
            |found| {
                found
                    .as_ref()
                    .map_or(false, |r| r.offering_drivers().len() == 6)
            },
        )
        .await
        .into_result()
        .unwrap()
        .unwrap();
    let head = harness.lifecycle.ledger().head(&id).unwrap().unwrap();
    assert_eq!(stored.entity.version(), 7);
    assert_eq!(stored.offering_drivers(), head.offering_drivers());
    assert_eq!(stored.entity.events(), head.entity.events());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stored_status_never_trails_the_last_transition() {
    let harness = Harness::new();
    let lifecycle = &harness.lifecycle;

    let mut request = lifecycle.create(draft("rachel")).unwrap();
    lifecycle.submit_offer(&mut request, "dave").unwrap();
    lifecycle.confirm_driver(&mut request, "dave").unwrap();
    lifecycle.complete(&mut request).unwrap();
    lifecycle.pay(&mut request).unwrap();

    let id = request.id().to_string();
    let settled = reconciler()
        .poll(
            || harness.repository.get(&id),
            |found| found.as_ref().map_or(false, |r| r.status() == RequestStatus::Paid),
        )
        .await;
    assert!(settled.converged);

    // later writes have all drained; the store stays at the final state
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    let stored = harness.repository.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status(), RequestStatus::Paid);
    assert_eq!(stored.entity.version(), request.entity.version());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirms_have_one_winner() {
    let harness = Arc::new(Harness::new());
    let mut request = harness.lifecycle.create(draft("rachel")).unwrap();
    let drivers: Vec<String> = (0..6).map(|i| format!("driver-{}", i)).collect();
    for driver in &drivers {
        harness.lifecycle.submit_offer(&mut request, driver).unwrap();
    }

    let tasks: Vec<_> = drivers
        .iter()
        .cloned()
        .map(|driver| {
            let harness = Arc::clone(&harness);
            let mut copy = request.clone();
            tokio::spawn(async move {
                harness
                    .lifecycle
                    .confirm_driver(&mut copy, &driver)
                    .map(|r| r.confirmed_driver().map(str::to_string))
            })
        })
        .collect();

    let mut winners = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(confirmed) => winners.push(confirmed),
            Err(err) => assert!(matches!(err, RideError::AlreadyConfirmed { .. }), "{}", err),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(
        harness.lifecycle.ledger().confirmed_driver(request.id()).unwrap(),
        winners[0]
    );
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn mirrored_request_replays_from_store() {
    let harness = Harness::new();
    let lifecycle = &harness.lifecycle;

    let mut request = lifecycle.create(draft("rachel")).unwrap();
    lifecycle.submit_offer(&mut request, "dave").unwrap();
    lifecycle.submit_offer(&mut request, "erin").unwrap();
    lifecycle.confirm_driver(&mut request, "erin").unwrap();

    let id = request.id().to_string();
    let stored = reconciler()
        .poll(
            || harness.repository.get(&id),
            |found| {
                found
                    .as_ref()
                    .map_or(false, |r| r.status() == RequestStatus::Confirmed)
            },
        )
        .await
        .into_result()
        .unwrap()
        .unwrap();

    assert_eq!(stored.entity.version(), request.entity.version());
    assert_eq!(stored.offering_drivers(), request.offering_drivers());
    assert_eq!(stored.confirmed_driver(), Some("erin"));
    assert_eq!(stored.start(), request.start());
}
