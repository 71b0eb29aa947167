use httpmock::prelude::*;
use serde_json::json;
use sip_ingest::notify::NotifyClient;
use sip_ingest::registry::RegistryClient;
use sip_ingest::upload::StorageClient;
use sip_ingest_core::contract::{
    ArchivalPayload, CompletionNotifier, FileDescriptor, MetadataRegistrar, ObjectStore,
    OutcomeStatus, ProcessingOutcome,
};
use sip_ingest_core::error::CapabilityError;
use std::time::Duration;
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(5);

fn sample_payload() -> ArchivalPayload {
    ArchivalPayload {
        transfer_id: "T1".to_string(),
        originals: vec![FileDescriptor {
            name: "Relatorio_final.docx".to_string(),
            original_name: Some("Relatório final.docx".to_string()),
            storage_key: "ra-1/Relatorio_final.docx".to_string(),
            digest: "ab".repeat(32),
            format_tag: "docx".to_string(),
        }],
        preserved: vec![],
    }
}

#[tokio::test]
async fn storage_upload_returns_json_ack() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/storage/upload");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "etag": "abc123", "key": "ra-1/report.pdf" }));
        })
        .await;

    let dir = tempdir().unwrap();
    let artifact = dir.path().join("report.pdf");
    std::fs::write(&artifact, b"%PDF-1.4 body").unwrap();

    let client = StorageClient::new(server.url("/storage/upload"), TIMEOUT).unwrap();
    let ack = client
        .upload(&artifact, "preservation", "ra-1/report.pdf")
        .await
        .expect("upload should succeed");

    mock.assert_async().await;
    assert_eq!(ack.0["etag"], "abc123");
}

#[tokio::test]
async fn storage_server_error_is_transient_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/storage/upload");
            then.status(500).body("disk full");
        })
        .await;

    let dir = tempdir().unwrap();
    let artifact = dir.path().join("a.txt");
    std::fs::write(&artifact, b"a").unwrap();

    let client = StorageClient::new(server.url("/storage/upload"), TIMEOUT).unwrap();
    let err = client
        .upload(&artifact, "originals", "ra-1/a.txt")
        .await
        .unwrap_err();

    match &err {
        CapabilityError::Status { code, body } => {
            assert_eq!(*code, 500);
            assert!(body.contains("disk full"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn storage_upload_of_missing_file_never_reaches_server() {
    let server = MockServer::start_async().await;
    let dir = tempdir().unwrap();

    let client = StorageClient::new(server.url("/storage/upload"), TIMEOUT).unwrap();
    let err = client
        .upload(&dir.path().join("gone.txt"), "originals", "ra-1/gone.txt")
        .await
        .unwrap_err();

    assert!(matches!(err, CapabilityError::Io(_)));
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    // Nothing listens on port 1.
    let client = NotifyClient::new("http://127.0.0.1:1/notify", TIMEOUT).unwrap();
    let outcome = ProcessingOutcome {
        transfer_id: "T1".to_string(),
        status: OutcomeStatus::Completed,
        message: String::new(),
    };

    let err = client.notify(&outcome).await.unwrap_err();
    assert!(matches!(err, CapabilityError::Transport(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn slow_service_hits_client_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/aips/");
            then.status(201).delay(Duration::from_secs(3));
        })
        .await;

    let client = RegistryClient::new(server.url("/aips/"), Duration::from_millis(200)).unwrap();
    let err = client.register(&sample_payload()).await.unwrap_err();

    assert!(matches!(err, CapabilityError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn registry_accepts_only_created() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/aips/").json_body(json!({
                "transfer_id": "T1",
                "originals": [{
                    "name": "Relatorio_final.docx",
                    "original_name": "Relatório final.docx",
                    "storage_key": "ra-1/Relatorio_final.docx",
                    "digest": "ab".repeat(32),
                    "format_tag": "docx"
                }],
                "preserved": []
            }));
            then.status(201);
        })
        .await;

    let client = RegistryClient::new(server.url("/aips/"), TIMEOUT).unwrap();
    client
        .register(&sample_payload())
        .await
        .expect("201 should be accepted");
    mock.assert_async().await;
}

#[tokio::test]
async fn registry_rejects_plain_ok() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/aips/");
            then.status(200).body("{}");
        })
        .await;

    let client = RegistryClient::new(server.url("/aips/"), TIMEOUT).unwrap();
    let err = client.register(&sample_payload()).await.unwrap_err();

    match err {
        CapabilityError::UnexpectedStatus { expected, code, .. } => {
            assert_eq!(expected, 201);
            assert_eq!(code, 200);
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn registry_client_error_is_not_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/aips/");
            then.status(400).body("bad payload");
        })
        .await;

    let client = RegistryClient::new(server.url("/aips/"), TIMEOUT).unwrap();
    let err = client.register(&sample_payload()).await.unwrap_err();

    assert!(!err.is_transient());
}

#[tokio::test]
async fn notify_posts_outcome_json() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/internal/processing-complete")
                .json_body(json!({
                    "transferId": "T1",
                    "status": "FAILED",
                    "message": "File normalization failed."
                }));
            then.status(204);
        })
        .await;

    let client = NotifyClient::new(server.url("/internal/processing-complete"), TIMEOUT).unwrap();
    client
        .notify(&ProcessingOutcome {
            transfer_id: "T1".to_string(),
            status: OutcomeStatus::Failed,
            message: "File normalization failed.".to_string(),
        })
        .await
        .expect("any 2xx should be accepted");
    mock.assert_async().await;
}

#[tokio::test]
async fn notify_service_unavailable_is_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/internal/processing-complete");
            then.status(503);
        })
        .await;

    let client = NotifyClient::new(server.url("/internal/processing-complete"), TIMEOUT).unwrap();
    let err = client
        .notify(&ProcessingOutcome {
            transfer_id: "T1".to_string(),
            status: OutcomeStatus::Completed,
            message: String::new(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CapabilityError::Status { code: 503, .. }));
    assert!(err.is_transient());
}
