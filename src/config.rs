//! Pipeline configuration

use crate::error::Result;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration consumed by the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// File extensions eligible for ingestion (lowercase, leading dot)
    pub accepted_extensions: BTreeSet<String>,

    /// Directory watched by the local change source, if any
    pub watch_path: Option<PathBuf>,

    /// Attempt limit for the remote sync retry loop
    pub max_sync_retries: u32,

    /// Base delay for exponential backoff between sync attempts
    pub base_backoff_ms: u64,
}

impl IngestConfig {
    /// Load configuration from `path`, creating a default one if absent
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading ingest config from {:?}", path);
            let json = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&json)?)
        } else {
            warn!("No ingest config found, creating default at {:?}", path);
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Saved ingest config to {:?}", path);
        Ok(())
    }

    /// Retry policy for the remote sync runner
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_sync_retries,
            base_delay: Duration::from_millis(self.base_backoff_ms),
        }
    }

    /// Whether a file name passes the extension filter (case-insensitive)
    pub fn accepts(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.accepted_extensions
            .iter()
            .any(|ext| lower.ends_with(ext.as_str()))
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: ["pdf", "txt", "md", "doc", "docx"]
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect(),
            watch_path: None,
            max_sync_retries: 3,
            base_backoff_ms: 1000,
        }
    }
}
