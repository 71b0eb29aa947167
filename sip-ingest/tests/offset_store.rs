use sip_ingest::kafka::OffsetStore;
use sip_ingest_core::error::FeedError;
use tempfile::tempdir;

#[tokio::test]
async fn missing_offset_file_means_no_recorded_position() {
    let dir = tempdir().unwrap();
    let store = OffsetStore::new(dir.path().join("offset"));

    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn saved_offset_is_loaded_back() {
    let dir = tempdir().unwrap();
    let store = OffsetStore::new(dir.path().join("state").join("offset"));

    store.save(41).await.unwrap();
    store.save(42).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(42));
    assert!(!store.path().with_extension("tmp").exists());
}

#[tokio::test]
async fn corrupt_offset_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("offset");
    std::fs::write(&path, "not-a-number").unwrap();

    let err = OffsetStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, FeedError::Commit(_)));
}
