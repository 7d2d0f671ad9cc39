//! Contract Test: Open-Edit Conflicts and Completion Polling
//!
//! This test verifies the dispatcher's pacing against the backend.
//!
//! Constraints verified:
//! - OPEN_ZONE_EDITS is retried after `poll_interval`, without limit
//! - PENDING is re-polled after `poll_interval`
//! - Neither retrying nor polling produces an error for the caller
//! - A conflict on one zone does not hold up another zone
//!
//! If this test fails, someone has changed retry ownership or pacing.

mod common;

use common::*;
use cscdm_core::{RecordAction, RecordType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn open_zone_edits_are_retried_until_accepted() {
    let api = Arc::new(
        MockZoneApi::new()
            .with_zone("busy.com")
            .with_open_edits("busy.com", 3),
    );
    let client = client_for(&api);
    let started = Instant::now();

    let record = client
        .perform_record_action(RecordAction::add("busy.com", RecordType::A, "www", "192.0.2.1"))
        .await
        .expect("conflicts are retried, not reported")
        .expect("record is returned");

    assert_eq!(record.key, "www");
    assert_eq!(api.submit_calls(), 4, "three conflicts, then accepted");
    // idle window plus one poll interval per conflict
    assert!(started.elapsed() >= Duration::from_millis(100 + 3 * 1_000));

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pending_edits_are_polled_until_complete() {
    let api = Arc::new(
        MockZoneApi::new()
            .with_zone("slow.com")
            .with_pending_polls(4),
    );
    let client = client_for(&api);
    let started = Instant::now();

    let result = client
        .perform_record_action(RecordAction::add("slow.com", RecordType::Txt, "_verify", "abc123"))
        .await;

    assert!(result.is_ok());
    assert_eq!(api.status_calls(), 5);
    assert_eq!(api.submit_calls(), 1);
    assert!(started.elapsed() >= Duration::from_secs(4));

    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn conflict_on_one_zone_does_not_delay_another() {
    let api = Arc::new(
        MockZoneApi::new()
            .with_zone("busy.com")
            .with_zone("quiet.com")
            .with_open_edits("busy.com", 5),
    );
    let client = client_for(&api);

    let busy = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .perform_record_action(RecordAction::add("busy.com", RecordType::A, "www", "192.0.2.1"))
                .await
        })
    };

    let quiet = tokio::time::timeout(
        Duration::from_secs(2),
        client.perform_record_action(RecordAction::add("quiet.com", RecordType::A, "www", "192.0.2.2")),
    )
    .await
    .expect("quiet zone should not wait for the busy one");
    assert!(quiet.is_ok());
    assert!(!busy.is_finished());

    assert!(busy.await.unwrap().is_ok());
    assert_eq!(api.submit_calls(), 1 + 6);

    client.stop().await;
}
