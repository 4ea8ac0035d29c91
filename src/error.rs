//! Ingestion error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the ingestion pipeline and its collaborators
#[derive(Error, Debug)]
pub enum IngestError {
    /// Metadata store cannot be reached; never retried inside the store
    #[error("metadata store unavailable: {0}")]
    StorageUnavailable(#[source] sea_orm::DbErr),

    /// Remote poll call failed; retried by the sync runner, then fatal for the cycle
    #[error("remote sync failed: {0}")]
    SyncFailed(String),

    /// Filesystem watch fault; reported, does not terminate the pipeline
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Task handoff to the downstream queue failed
    #[error("task queue error: {0}")]
    Queue(String),

    /// Invalid transient-file exclusion pattern
    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// Watched directory does not exist or is not a directory
    #[error("not a watchable directory: {0}")]
    NotADirectory(PathBuf),

    /// Service lifecycle misuse
    #[error("service is already running")]
    AlreadyRunning,

    #[error("service is not running")]
    NotRunning,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;
