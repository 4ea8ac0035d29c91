//! Local folder watch change source
//!
//! Long-lived producer of raw filesystem events for one directory. Suppression
//! of redundant modifications happens downstream in the pipeline's dedup on
//! content hash; this source only filters out transient files (partial
//! downloads, editor swap files) that should never reach the pipeline.

use super::{ChangeEvent, ChangeKind};
use crate::error::{IngestError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Glob patterns for files that are never emitted
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "*.tmp",
    "*.part",
    "*.partial",
    "*.crdownload",
    "*.download",
    "*.swp",
    ".~*",
    ".DS_Store",
];

/// Configuration for one watched directory
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub path: PathBuf,
    pub recursive: bool,
    /// Glob patterns matched against file names; matches are suppressed
    pub exclude_patterns: Vec<String>,
}

impl WatcherConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: false,
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Watches a directory and delivers change events over a channel.
///
/// Explicitly stoppable: `stop` drops the underlying OS watch handle and no
/// events are delivered afterward (the event channel closes).
pub struct FolderWatcher {
    config: WatcherConfig,
    exclusions: GlobSet,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FolderWatcher {
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            builder.add(Glob::new(pattern)?);
        }
        let exclusions = builder.build()?;

        Ok(Self {
            config,
            exclusions,
            watcher: Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        self.watcher.lock().expect("watcher lock poisoned").is_some()
    }

    /// Start watching. Emits one `Added` per file already present, then
    /// forwards filesystem events as they occur. Returns the event receiver;
    /// the channel closes once the watcher is stopped.
    pub async fn start(&self) -> Result<mpsc::UnboundedReceiver<ChangeEvent>> {
        if self.is_running() {
            return Err(IngestError::AlreadyRunning);
        }
        if !self.config.path.is_dir() {
            return Err(IngestError::NotADirectory(self.config.path.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let exclusions = self.exclusions.clone();
        let event_tx = tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for change in translate_event(&event, &exclusions) {
                        if event_tx.send(change).is_err() {
                            trace!("Watcher receiver dropped, discarding event");
                        }
                    }
                }
                // Watch faults are reported and the watch keeps running
                Err(e) => warn!("Filesystem watch fault: {}", e),
            },
            notify::Config::default(),
        )?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&self.config.path, mode)?;

        // Scan only after the OS watch is registered so nothing lands in the
        // gap between the two; the pipeline's hash dedup absorbs any file
        // sighted by both the scan and a live event.
        self.scan_existing(&tx).await?;
        drop(tx);

        *self.watcher.lock().expect("watcher lock poisoned") = Some(watcher);
        info!("Watching {:?} for changes", self.config.path);
        Ok(rx)
    }

    /// Stop watching and release the OS watch handle. No further events are
    /// delivered afterward.
    pub fn stop(&self) -> Result<()> {
        let handle = self.watcher.lock().expect("watcher lock poisoned").take();
        match handle {
            Some(watcher) => {
                drop(watcher);
                info!("Stopped watching {:?}", self.config.path);
                Ok(())
            }
            None => Err(IngestError::NotRunning),
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.exclusions.is_match(name))
            .unwrap_or(false)
    }

    async fn scan_existing(&self, tx: &mpsc::UnboundedSender<ChangeEvent>) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.config.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() || self.is_excluded(&path) {
                continue;
            }
            debug!("Existing file at startup: {:?}", path);
            let _ = tx.send(ChangeEvent::local(path, ChangeKind::Added));
        }
        Ok(())
    }
}

/// Map a raw notify event to pipeline change events, applying exclusions
fn translate_event(event: &Event, exclusions: &GlobSet) -> Vec<ChangeEvent> {
    let for_all = |kind: ChangeKind| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .filter_map(|path| change_for(path, kind, exclusions))
            .collect()
    };

    match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => for_all(ChangeKind::Added),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => for_all(ChangeKind::Modified),
        EventKind::Remove(RemoveKind::File | RemoveKind::Any) => for_all(ChangeKind::Removed),
        // Renames matter: finished downloads arrive by renaming the partial
        // file into place, so the new name is an addition
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            change_for(&event.paths[0], ChangeKind::Removed, exclusions)
                .into_iter()
                .chain(change_for(&event.paths[1], ChangeKind::Added, exclusions))
                .collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => for_all(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => for_all(ChangeKind::Added),
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Unpaired rename half with unknown direction: a path still on
            // disk arrived, a missing one left
            event
                .paths
                .iter()
                .filter_map(|path| {
                    let kind = if path.is_file() {
                        ChangeKind::Added
                    } else {
                        ChangeKind::Removed
                    };
                    change_for(path, kind, exclusions)
                })
                .collect()
        }
        _ => {
            trace!("Ignoring filesystem event: {:?}", event.kind);
            Vec::new()
        }
    }
}

/// One change event for `path`, unless it is excluded or no longer a file
fn change_for(path: &Path, kind: ChangeKind, exclusions: &GlobSet) -> Option<ChangeEvent> {
    let excluded = path
        .file_name()
        .map(|name| exclusions.is_match(name))
        .unwrap_or(false);
    if excluded {
        trace!("Suppressing transient file event: {:?}", path);
        return None;
    }
    // Removed paths no longer exist on disk, so only gate live paths
    if kind != ChangeKind::Removed && !path.is_file() {
        return None;
    }
    Some(ChangeEvent::local(path.to_path_buf(), kind))
}
