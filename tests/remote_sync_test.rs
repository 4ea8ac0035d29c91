//! Remote sync cycle tests: poll with retry and backoff, then ingest

use docsync_core::{
    ChangeBatch, ChangeEvent, ChangeKind, IngestConfig, IngestError, IngestPipeline,
    MemoryTaskQueue, MetadataStore, RemoteEndpoint, RemoteSource, SqliteMetadataStore,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Endpoint that fails a fixed number of polls before answering
struct FlakyEndpoint {
    failures_before_success: u32,
    calls: AtomicU32,
}

impl FlakyEndpoint {
    fn new(failures_before_success: u32) -> Self {
        Self {
            failures_before_success,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteEndpoint for FlakyEndpoint {
    async fn poll_changes(&self, cursor: Option<&str>) -> docsync_core::Result<ChangeBatch> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            return Err(IngestError::SyncFailed(format!(
                "endpoint unreachable (call {call})"
            )));
        }
        assert!(cursor.is_none(), "cursor must not advance on failed polls");
        Ok(ChangeBatch {
            changes: vec![ChangeEvent::inline(
                "remote-9",
                "synced.pdf",
                ChangeKind::Added,
                b"synced content".to_vec(),
            )],
            next_cursor: Some("cursor-1".to_string()),
        })
    }
}

async fn pipeline_fixture() -> (IngestPipeline, Arc<SqliteMetadataStore>, Arc<MemoryTaskQueue>) {
    let store = Arc::new(SqliteMetadataStore::connect_in_memory().await.unwrap());
    let queue = Arc::new(MemoryTaskQueue::new());
    let pipeline = IngestPipeline::new(IngestConfig::default(), store.clone(), queue.clone());
    (pipeline, store, queue)
}

#[tokio::test]
async fn sync_recovers_after_transient_failures() {
    let (pipeline, store, queue) = pipeline_fixture().await;
    let endpoint = Arc::new(FlakyEndpoint::new(2));
    let source = RemoteSource::new(endpoint.clone());

    let outcome = pipeline.sync_remote(&source).await.unwrap();

    assert_eq!(endpoint.calls(), 3);
    assert_eq!(outcome.ingested, 1);
    assert_eq!(store.len().await.unwrap(), 1);
    assert_eq!(queue.len(), 1);
    assert_eq!(source.cursor().as_deref(), Some("cursor-1"));
}

#[tokio::test]
async fn sync_gives_up_after_configured_attempts() {
    let (pipeline, store, queue) = pipeline_fixture().await;
    let endpoint = Arc::new(FlakyEndpoint::new(u32::MAX));
    let source = RemoteSource::new(endpoint.clone());

    let err = pipeline.sync_remote(&source).await.unwrap_err();

    assert!(matches!(err, IngestError::SyncFailed(_)));
    assert_eq!(endpoint.calls(), 3);
    assert_eq!(store.len().await.unwrap(), 0);
    assert!(queue.is_empty());
    assert!(source.cursor().is_none());

    // The next cycle starts fresh with its own attempt budget
    let err = pipeline.sync_remote(&source).await.unwrap_err();
    assert!(matches!(err, IngestError::SyncFailed(_)));
    assert_eq!(endpoint.calls(), 6);
}

#[tokio::test]
async fn empty_poll_is_a_noop() {
    struct QuietEndpoint;

    #[async_trait::async_trait]
    impl RemoteEndpoint for QuietEndpoint {
        async fn poll_changes(&self, _cursor: Option<&str>) -> docsync_core::Result<ChangeBatch> {
            Ok(ChangeBatch {
                changes: vec![],
                next_cursor: Some("still-advances".to_string()),
            })
        }
    }

    let (pipeline, store, queue) = pipeline_fixture().await;
    let source = RemoteSource::new(Arc::new(QuietEndpoint));

    let outcome = pipeline.sync_remote(&source).await.unwrap();

    assert_eq!(outcome, docsync_core::BatchOutcome::default());
    assert_eq!(store.len().await.unwrap(), 0);
    assert!(queue.is_empty());
    assert_eq!(source.cursor().as_deref(), Some("still-advances"));
}
