use sip_ingest_core::contract::{
    MockCompletionNotifier, MockMetadataRegistrar, MockObjectStore, ObjectStore,
    OutcomeStatus, ProcessingOutcome, UploadAck,
};
use sip_ingest_core::contract::{CompletionNotifier, MetadataRegistrar, ArchivalPayload};
use sip_ingest_core::error::CapabilityError;
use sip_ingest_core::retry::{connect_with_backoff, Backoff, RetryPolicy, Retrying};

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn quick(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(1), Some(max_attempts))
}

#[test]
fn exponential_backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_millis(500), None);
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    assert_eq!(policy.delay_for(60), Duration::from_millis(500));
    assert!(policy.allows_another(1_000));
}

#[test]
fn fixed_backoff_respects_attempt_ceiling() {
    let policy = RetryPolicy::fixed(Duration::from_secs(10), Some(3));
    assert_eq!(policy.delay_for(1), Duration::from_secs(10));
    assert_eq!(policy.delay_for(7), Duration::from_secs(10));
    assert!(policy.allows_another(2));
    assert!(!policy.allows_another(3));
    assert!(!RetryPolicy::none().allows_another(1));
}

#[test]
fn policy_deserializes_from_tagged_form() {
    let policy: RetryPolicy = serde_json::from_value(serde_json::json!({
        "backoff": { "kind": "exponential", "initial_ms": 250, "max_ms": 4000 },
        "max_attempts": 5
    }))
    .unwrap();
    assert_eq!(
        policy.backoff,
        Backoff::Exponential {
            initial_ms: 250,
            max_ms: 4000
        }
    );
    assert_eq!(policy.max_attempts, Some(5));

    let unbounded: RetryPolicy = serde_json::from_value(serde_json::json!({
        "backoff": { "kind": "fixed", "delay_ms": 10000 }
    }))
    .unwrap();
    assert_eq!(unbounded.max_attempts, None);
}

#[tokio::test]
async fn transient_upload_failures_are_retried_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut store = MockObjectStore::new();
    store.expect_upload().times(3).returning(move |_, _, _| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(CapabilityError::Status {
                code: 502,
                body: "bad gateway".into(),
            })
        } else {
            Ok(UploadAck(serde_json::json!({ "ok": true })))
        }
    });

    let retrying = Retrying::new(store, quick(5));
    let ack = retrying
        .upload(Path::new("/tmp/x"), "originals", "RA/x")
        .await
        .expect("third attempt succeeds");

    assert_eq!(ack.0["ok"], true);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let mut registrar = MockMetadataRegistrar::new();
    registrar.expect_register().times(1).returning(|_| {
        Err(CapabilityError::UnexpectedStatus {
            expected: 201,
            code: 422,
            body: "invalid".into(),
        })
    });

    let retrying = Retrying::new(registrar, quick(5));
    let payload = ArchivalPayload {
        transfer_id: "T".into(),
        originals: vec![],
        preserved: vec![],
    };
    let err = retrying.register(&payload).await.unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn retries_stop_at_the_attempt_ceiling() {
    let mut notifier = MockCompletionNotifier::new();
    notifier
        .expect_notify()
        .times(2)
        .returning(|_| Err(CapabilityError::Timeout));

    let retrying = Retrying::new(notifier, quick(2));
    let outcome = ProcessingOutcome {
        transfer_id: "T".into(),
        status: OutcomeStatus::Completed,
        message: String::new(),
    };
    assert!(matches!(
        retrying.notify(&outcome).await,
        Err(CapabilityError::Timeout)
    ));
}

#[tokio::test(start_paused = true)]
async fn connect_with_backoff_keeps_trying_until_connected() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::fixed(Duration::from_secs(10), None);

    let counter = attempts.clone();
    let result: Result<&str, String> = connect_with_backoff(&policy, "broker", || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 4 {
                Err("no brokers available".to_string())
            } else {
                Ok("connected")
            }
        }
    })
    .await;

    assert_eq!(result, Ok("connected"));
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn connect_with_backoff_returns_last_error_when_capped() {
    let policy = RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(8), Some(3));
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = attempts.clone();
    let result: Result<(), String> = connect_with_backoff(&policy, "broker", || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Err(format!("attempt {n} failed")) }
    })
    .await;

    assert_eq!(result, Err("attempt 3 failed".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}
