//! docsync-core
//!
//! A file-ingestion and deduplication pipeline: change sources (a watched
//! folder, a polled remote endpoint) feed content-addressed records into a
//! metadata store, and every newly seen piece of content is dispatched as a
//! processing task to an external queue. Remote polls are wrapped in bounded
//! retry with exponential backoff.
//!
//! All components are explicit instances wired at construction; there is no
//! process-wide state.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod source;
pub mod store;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use fingerprint::ContentHash;
pub use pipeline::{BatchOutcome, EventOutcome, IngestPipeline, SkipReason};
pub use queue::{MemoryTaskQueue, ProcessingTask, TaskId, TaskQueue};
pub use retry::RetryPolicy;
pub use source::{
    ByteSource, ChangeBatch, ChangeEvent, ChangeKind, FolderWatcher, RemoteEndpoint, RemoteSource,
    WatcherConfig,
};
pub use store::{FileRecord, FileSighting, MetadataStore, SqliteMetadataStore, UpsertOutcome};

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Top-level service wiring a pipeline to its change sources.
///
/// The folder watcher is a long-lived background listener scoped to this
/// service: started on activation, stopped on shutdown, with the OS watch
/// handle released on every shutdown path.
pub struct IngestService {
    pipeline: Arc<IngestPipeline>,
    watcher: Option<Arc<FolderWatcher>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl IngestService {
    /// Wire a service from its configuration and injected collaborators
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn MetadataStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Result<Self> {
        let watcher = match &config.watch_path {
            Some(path) => Some(Arc::new(FolderWatcher::new(WatcherConfig::new(path))?)),
            None => None,
        };
        let pipeline = Arc::new(IngestPipeline::new(config, store, queue));

        Ok(Self {
            pipeline,
            watcher,
            consumer: Mutex::new(None),
        })
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    /// Start the background watch loop, if a watch path is configured
    pub async fn start(&self) -> Result<()> {
        let Some(watcher) = &self.watcher else {
            info!("No watch path configured, nothing to start");
            return Ok(());
        };

        let mut events = watcher.start().await?;
        let pipeline = self.pipeline.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match pipeline.process_event(event).await {
                    Ok(_) => {}
                    Err(IngestError::Io(e)) => {
                        // Single-file fault, siblings keep flowing
                        warn!("Failed to read watched file: {}", e);
                    }
                    Err(e) => {
                        error!("Ingestion fault in watch loop: {}", e);
                    }
                }
            }
            info!("Watch event channel closed, consumer exiting");
        });

        *self.consumer.lock().await = Some(handle);
        info!("Ingest service started");
        Ok(())
    }

    /// Run one remote sync cycle against `source`
    pub async fn sync_remote(&self, source: &RemoteSource) -> Result<BatchOutcome> {
        self.pipeline.sync_remote(source).await
    }

    /// Stop the watcher and drain the consumer. Safe to call on error paths;
    /// the watch handle is always released.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(watcher) = &self.watcher {
            match watcher.stop() {
                Ok(()) | Err(IngestError::NotRunning) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(handle) = self.consumer.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Watch consumer terminated abnormally: {}", e);
            }
        }

        info!("Ingest service shut down");
        Ok(())
    }
}
