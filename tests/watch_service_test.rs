//! Service-level test: watched folder feeding the pipeline end to end

use docsync_core::{
    ContentHash, IngestConfig, IngestService, MemoryTaskQueue, MetadataStore, SqliteMetadataStore,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn wait_for_tasks(queue: &MemoryTaskQueue, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while queue.len() < expected {
        if tokio::time::Instant::now() > deadline {
            panic!("expected {expected} task(s), got {}", queue.len());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn watched_folder_ingests_existing_and_new_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("preexisting.pdf"), b"already here").unwrap();
    // Transient download artifacts never reach the pipeline
    std::fs::write(dir.path().join("incoming.pdf.crdownload"), b"half").unwrap();

    let store = Arc::new(SqliteMetadataStore::connect_in_memory().await.unwrap());
    let queue = Arc::new(MemoryTaskQueue::new());
    let config = IngestConfig {
        watch_path: Some(dir.path().to_path_buf()),
        ..IngestConfig::default()
    };

    let service = IngestService::new(config, store.clone(), queue.clone()).unwrap();
    service.start().await.unwrap();

    // The file present at startup is ingested
    wait_for_tasks(&queue, 1).await;
    let hash = ContentHash::from_bytes(b"already here");
    assert!(store.exists(&hash).await.unwrap());

    // A file dropped in after startup is picked up too
    std::fs::write(dir.path().join("dropped.pdf"), b"landed later").unwrap();
    wait_for_tasks(&queue, 2).await;
    let hash = ContentHash::from_bytes(b"landed later");
    assert!(store.exists(&hash).await.unwrap());

    // The excluded partial download never produced a record
    let hash = ContentHash::from_bytes(b"half");
    assert!(!store.exists(&hash).await.unwrap());

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_without_watch_path_is_clean() {
    let store = Arc::new(SqliteMetadataStore::connect_in_memory().await.unwrap());
    let queue = Arc::new(MemoryTaskQueue::new());

    let service = IngestService::new(IngestConfig::default(), store, queue).unwrap();
    service.start().await.unwrap();
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_is_safe_after_failed_start() {
    let store = Arc::new(SqliteMetadataStore::connect_in_memory().await.unwrap());
    let queue = Arc::new(MemoryTaskQueue::new());
    let config = IngestConfig {
        watch_path: Some("/definitely/not/a/real/dir".into()),
        ..IngestConfig::default()
    };

    let service = IngestService::new(config, store, queue).unwrap();
    assert!(service.start().await.is_err());
    // Error shutdown still releases (never-acquired) watch resources
    service.shutdown().await.unwrap();
}
