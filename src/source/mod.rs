//! Change sources
//!
//! Two variants produce the same `ChangeEvent` stream: a remote poll against a
//! sync endpoint (`remote`) and a local directory watch (`watch`). Events are
//! ephemeral and consumed exactly once by the pipeline.

use std::path::PathBuf;

pub mod remote;
pub mod watch;

pub use remote::{ChangeBatch, RemoteEndpoint, RemoteSource};
pub use watch::{FolderWatcher, WatcherConfig};

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// Where the pipeline gets the file's bytes from, deferred until needed
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// Content delivered with the event (remote sync payloads)
    Inline(Vec<u8>),
    /// Content read from disk at processing time (local watch)
    File(PathBuf),
}

/// A discrete add/modify/remove notification from a change source
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Origin identifier when the source has one (remote file id)
    pub source_id: Option<String>,
    /// Path or name the source observed the file under
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// Absent for `Removed` events
    pub bytes: Option<ByteSource>,
}

impl ChangeEvent {
    /// Event for a file on disk
    pub fn local(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        let path = path.into();
        let bytes = match kind {
            ChangeKind::Removed => None,
            _ => Some(ByteSource::File(path.clone())),
        };
        Self {
            source_id: None,
            path,
            kind,
            bytes,
        }
    }

    /// Event carrying its content inline, as remote sync payloads do
    pub fn inline(
        source_id: impl Into<String>,
        name: impl Into<PathBuf>,
        kind: ChangeKind,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            source_id: Some(source_id.into()),
            path: name.into(),
            kind,
            bytes: Some(ByteSource::Inline(bytes)),
        }
    }

    /// Display name for the record: the final path component
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

impl ByteSource {
    /// Read the full content. Bounded by available memory; streaming is out of
    /// scope for dedup keys.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Inline(bytes) => Ok(bytes.clone()),
            Self::File(path) => tokio::fs::read(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_removed_event_has_no_bytes() {
        let event = ChangeEvent::local("/tmp/gone.pdf", ChangeKind::Removed);
        assert!(event.bytes.is_none());
        assert_eq!(event.file_name(), "gone.pdf");
    }

    #[tokio::test]
    async fn inline_bytes_read_back() {
        let event = ChangeEvent::inline("remote-1", "paper.pdf", ChangeKind::Added, b"pdf".to_vec());
        let bytes = event.bytes.as_ref().unwrap().read().await.unwrap();
        assert_eq!(bytes, b"pdf");
    }
}
