//! Remote poll change source
//!
//! Contacts an external sync endpoint and returns the changes since the last
//! successful poll, plus an opaque cursor for the next call. Zero changes is a
//! no-op; a failed call surfaces as an error so the retry layer can tell "no
//! changes" from "poll failed".

use super::ChangeEvent;
use crate::error::Result;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One poll's worth of changes and the cursor to resume from
#[derive(Debug, Default)]
pub struct ChangeBatch {
    pub changes: Vec<ChangeEvent>,
    pub next_cursor: Option<String>,
}

/// External sync endpoint, opaque request/response
#[async_trait::async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// Fetch changes since `cursor` (None on the first poll). Implementations
    /// own their transport timeouts; the retry runner only spaces attempts.
    async fn poll_changes(&self, cursor: Option<&str>) -> Result<ChangeBatch>;
}

/// Poll-based change source holding the cursor from the last successful call
pub struct RemoteSource {
    endpoint: Arc<dyn RemoteEndpoint>,
    cursor: Mutex<Option<String>>,
}

impl RemoteSource {
    pub fn new(endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        Self::with_cursor(endpoint, None)
    }

    /// Resume from a previously persisted cursor
    pub fn with_cursor(endpoint: Arc<dyn RemoteEndpoint>, cursor: Option<String>) -> Self {
        Self {
            endpoint,
            cursor: Mutex::new(cursor),
        }
    }

    pub fn cursor(&self) -> Option<String> {
        self.cursor.lock().expect("cursor lock poisoned").clone()
    }

    /// Run one poll. The cursor only advances on success, so a failed poll
    /// re-reads the same window next time.
    pub async fn poll(&self) -> Result<Vec<ChangeEvent>> {
        let cursor = self.cursor();
        let batch = self.endpoint.poll_changes(cursor.as_deref()).await?;
        debug!(
            "Remote poll returned {} change(s), cursor {:?} -> {:?}",
            batch.changes.len(),
            cursor,
            batch.next_cursor
        );
        if let Some(next) = batch.next_cursor {
            *self.cursor.lock().expect("cursor lock poisoned") = Some(next);
        }
        Ok(batch.changes)
    }
}
