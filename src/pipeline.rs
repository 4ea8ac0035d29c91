//! Ingestion pipeline
//!
//! Consumes change events, fingerprints content, deduplicates against the
//! metadata store and hands newly accepted content to the downstream task
//! queue. Dedup is content-addressed: identical bytes map to one record no
//! matter how often, under what name, or from which source they appear.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::fingerprint::ContentHash;
use crate::queue::{ProcessingTask, TaskId, TaskQueue};
use crate::retry::RetryPolicy;
use crate::source::{ChangeEvent, ChangeKind, RemoteSource};
use crate::store::{FileRecord, FileSighting, MetadataStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a single change event
#[derive(Debug)]
pub enum EventOutcome {
    /// First sighting of this content: record created, task enqueued
    Ingested { record: FileRecord, task: TaskId },
    /// Known content re-sighted: record merged, nothing enqueued
    Updated { record: FileRecord },
    /// Event produced no record and no task
    Skipped(SkipReason),
}

/// Why an event was skipped, for logging and counters only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// File extension outside the accepted set; not an error
    UnsupportedExtension,
    /// Removal observed; records are retained on purpose, the same content
    /// may reappear from another source
    Removed,
    /// Event carried no readable content
    NoContent,
}

/// Per-batch counters for observability
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub ingested: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The dedup and dispatch stage between change sources and the task queue
pub struct IngestPipeline {
    config: IngestConfig,
    store: Arc<dyn MetadataStore>,
    queue: Arc<dyn TaskQueue>,
    retry: RetryPolicy,
}

impl IngestPipeline {
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn MetadataStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        let retry = config.retry_policy();
        Self {
            config,
            store,
            queue,
            retry,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Process a single change event.
    ///
    /// Store and queue failures propagate; they are batch-level faults for the
    /// caller to handle. Per-file read failures surface as `Io` and are
    /// absorbed by `process_batch`.
    pub async fn process_event(&self, event: ChangeEvent) -> Result<EventOutcome> {
        let file_name = event.file_name();

        if event.kind == ChangeKind::Removed {
            // Deliberate retention: the record stays even though the file is
            // gone, so the content is recognized if it reappears.
            info!("File removed, keeping its record: {:?}", event.path);
            return Ok(EventOutcome::Skipped(SkipReason::Removed));
        }

        if !self.config.accepts(&file_name) {
            debug!("Skipping unsupported file type: {:?}", event.path);
            return Ok(EventOutcome::Skipped(SkipReason::UnsupportedExtension));
        }

        let Some(bytes_source) = event.bytes.as_ref() else {
            warn!("Change event without content: {:?}", event.path);
            return Ok(EventOutcome::Skipped(SkipReason::NoContent));
        };
        let bytes = bytes_source.read().await?;

        let hash = ContentHash::from_bytes(&bytes);
        let outcome = self
            .store
            .upsert(FileSighting {
                content_hash: hash,
                file_name: file_name.clone(),
                file_size_bytes: bytes.len() as i64,
                source_id: event.source_id.clone(),
                tags: BTreeSet::new(),
            })
            .await?;

        if !outcome.created {
            debug!(
                "Content already known ({}), merged sighting of {:?}",
                outcome.record.content_hash, event.path
            );
            return Ok(EventOutcome::Updated {
                record: outcome.record,
            });
        }

        let task = self
            .queue
            .enqueue(ProcessingTask::process_file(
                outcome.record.source_id.clone(),
                outcome.record.file_name.clone(),
            ))
            .await?;
        info!(
            "Ingested {:?} as {} (task {})",
            event.path, outcome.record.content_hash, task
        );

        Ok(EventOutcome::Ingested {
            record: outcome.record,
            task,
        })
    }

    /// Process a batch of events.
    ///
    /// A single file's fault never aborts its siblings; storage or queue
    /// unavailability aborts the batch and propagates.
    pub async fn process_batch(&self, events: Vec<ChangeEvent>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for event in events {
            let path = event.path.clone();
            match self.process_event(event).await {
                Ok(EventOutcome::Ingested { .. }) => outcome.ingested += 1,
                Ok(EventOutcome::Updated { .. }) => outcome.updated += 1,
                Ok(EventOutcome::Skipped(_)) => outcome.skipped += 1,
                Err(IngestError::Io(e)) => {
                    warn!("Failed to read {:?}, skipping event: {}", path, e);
                    outcome.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    /// Run one remote sync cycle: poll with retry and backoff, then ingest the
    /// returned changes. After the configured attempts are exhausted the last
    /// poll error is re-raised; the next cycle starts fresh.
    pub async fn sync_remote(&self, source: &RemoteSource) -> Result<BatchOutcome> {
        let changes = self.retry.run("remote change poll", || source.poll()).await?;

        if changes.is_empty() {
            debug!("Remote sync returned no changes");
            return Ok(BatchOutcome::default());
        }

        self.process_batch(changes).await
    }
}
