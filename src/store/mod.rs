//! Content-addressed metadata store
//!
//! One record per distinct content hash. Records are created on first sighting
//! of a hash and merged (never duplicated) on later sightings, so the store is
//! the single place where dedup races must be designed out: `upsert` is one
//! conditional-write statement, not a read-then-write pair.

use crate::error::{IngestError, Result};
use crate::fingerprint::ContentHash;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter,
};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;

use entities::file_record;

/// One entry per distinct content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub content_hash: ContentHash,
    /// Last-observed name; mutable when the same content reappears renamed
    pub file_name: String,
    pub file_size_bytes: i64,
    pub tags: BTreeSet<String>,
    /// Origin identifier, remote or synthesized from the hash
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<file_record::Model> for FileRecord {
    fn from(model: file_record::Model) -> Self {
        let tags = model
            .tags
            .and_then(|json| serde_json::from_value(json).ok())
            .unwrap_or_default();
        Self {
            content_hash: model.content_hash.into(),
            file_name: model.file_name,
            file_size_bytes: model.file_size_bytes,
            tags,
            source_id: model.source_id,
            created_at: model.created_at,
            modified_at: model.modified_at,
        }
    }
}

/// Input to `upsert`: what one change event observed about a file
#[derive(Debug, Clone)]
pub struct FileSighting {
    pub content_hash: ContentHash,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub source_id: Option<String>,
    pub tags: BTreeSet<String>,
}

/// Result of an upsert, distinguishing first sighting from a merge
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub record: FileRecord,
    pub created: bool,
}

/// Durable mapping from content hash to file record
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// True iff a record with that hash is present; absence is not an error
    async fn exists(&self, hash: &ContentHash) -> Result<bool>;

    /// Insert the sighting, or merge it into the existing record for the same
    /// hash. Atomic under concurrent callers racing on one hash: no lost
    /// update, no duplicate insert. `content_hash` and `created_at` are never
    /// rewritten on merge.
    async fn upsert(&self, sighting: FileSighting) -> Result<UpsertOutcome>;

    /// Fetch the record for a hash, if any
    async fn get(&self, hash: &ContentHash) -> Result<Option<FileRecord>>;

    /// Number of distinct records
    async fn len(&self) -> Result<u64>;
}

/// SeaORM-backed store over sqlite
pub struct SqliteMetadataStore {
    conn: DatabaseConnection,
}

impl SqliteMetadataStore {
    /// Open (creating if needed) a store at `path` and run migrations
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(10)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .map_err(IngestError::StorageUnavailable)?;
        migration::Migrator::up(&conn, None)
            .await
            .map_err(IngestError::StorageUnavailable)?;

        info!("Opened metadata store at {:?}", path);
        Ok(Self { conn })
    }

    /// In-memory store for tests and ephemeral runs.
    ///
    /// A single pooled connection keeps every caller on the same database;
    /// sqlite gives each `:memory:` connection its own otherwise.
    pub async fn connect_in_memory() -> Result<Self> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .map_err(IngestError::StorageUnavailable)?;
        migration::Migrator::up(&conn, None)
            .await
            .map_err(IngestError::StorageUnavailable)?;

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

#[async_trait::async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn exists(&self, hash: &ContentHash) -> Result<bool> {
        let count = file_record::Entity::find()
            .filter(file_record::Column::ContentHash.eq(hash.as_str()))
            .count(&self.conn)
            .await
            .map_err(IngestError::StorageUnavailable)?;
        Ok(count > 0)
    }

    async fn upsert(&self, sighting: FileSighting) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let source_id = sighting
            .source_id
            .unwrap_or_else(|| sighting.content_hash.synthetic_source_id());
        let tags = if sighting.tags.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&sighting.tags)?)
        };

        let model = file_record::ActiveModel {
            id: NotSet,
            content_hash: Set(sighting.content_hash.as_str().to_string()),
            file_name: Set(sighting.file_name),
            file_size_bytes: Set(sighting.file_size_bytes),
            tags: Set(tags),
            source_id: Set(source_id),
            created_at: Set(now),
            modified_at: Set(now),
        };

        let stored = file_record::Entity::insert(model)
            .on_conflict(
                OnConflict::column(file_record::Column::ContentHash)
                    .update_columns([
                        file_record::Column::FileName,
                        file_record::Column::FileSizeBytes,
                        file_record::Column::Tags,
                        file_record::Column::SourceId,
                        file_record::Column::ModifiedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(&self.conn)
            .await
            .map_err(IngestError::StorageUnavailable)?;

        // A merge preserves the created_at of the original insert, which was
        // generated by an earlier call; only a fresh insert echoes back the
        // timestamp this call sent.
        let created = stored.created_at == now;

        Ok(UpsertOutcome {
            record: stored.into(),
            created,
        })
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        let model = file_record::Entity::find()
            .filter(file_record::Column::ContentHash.eq(hash.as_str()))
            .one(&self.conn)
            .await
            .map_err(IngestError::StorageUnavailable)?;
        Ok(model.map(Into::into))
    }

    async fn len(&self) -> Result<u64> {
        file_record::Entity::find()
            .count(&self.conn)
            .await
            .map_err(IngestError::StorageUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(bytes: &[u8], name: &str) -> FileSighting {
        FileSighting {
            content_hash: ContentHash::from_bytes(bytes),
            file_name: name.to_string(),
            file_size_bytes: bytes.len() as i64,
            source_id: None,
            tags: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_merges() {
        let store = SqliteMetadataStore::connect_in_memory().await.unwrap();

        let first = store.upsert(sighting(b"content", "a.pdf")).await.unwrap();
        assert!(first.created);
        assert_eq!(first.record.file_name, "a.pdf");

        let second = store.upsert(sighting(b"content", "b.pdf")).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.record.file_name, "b.pdf");
        assert_eq!(second.record.content_hash, first.record.content_hash);
        assert_eq!(second.record.created_at, first.record.created_at);
        assert!(second.record.modified_at >= first.record.modified_at);

        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rapid_resightings_report_created_exactly_once() {
        let store = SqliteMetadataStore::connect_in_memory().await.unwrap();

        // Back-to-back merges must never look like inserts, however close
        // their timestamps land to the original one
        let mut created = 0;
        for i in 0..10 {
            let outcome = store
                .upsert(sighting(b"burst content", &format!("burst-{i}.pdf")))
                .await
                .unwrap();
            if outcome.created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn exists_does_not_error_on_absence() {
        let store = SqliteMetadataStore::connect_in_memory().await.unwrap();
        let hash = ContentHash::from_bytes(b"never stored");
        assert!(!store.exists(&hash).await.unwrap());
        assert!(store.get(&hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn synthetic_source_id_fills_missing_origin() {
        let store = SqliteMetadataStore::connect_in_memory().await.unwrap();
        let outcome = store.upsert(sighting(b"orphan", "o.pdf")).await.unwrap();
        assert_eq!(
            outcome.record.source_id,
            outcome.record.content_hash.synthetic_source_id()
        );
    }

    #[tokio::test]
    async fn tags_roundtrip_through_json_column() {
        let store = SqliteMetadataStore::connect_in_memory().await.unwrap();
        let mut with_tags = sighting(b"tagged", "t.pdf");
        with_tags.tags = ["papers", "inbox"].iter().map(|s| s.to_string()).collect();

        store.upsert(with_tags.clone()).await.unwrap();
        let record = store.get(&with_tags.content_hash).await.unwrap().unwrap();
        assert_eq!(record.tags, with_tags.tags);
    }

    #[tokio::test]
    async fn concurrent_upserts_on_same_hash_yield_one_record() {
        let store = std::sync::Arc::new(SqliteMetadataStore::connect_in_memory().await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert(sighting(b"racy bytes", &format!("copy-{i}.pdf")))
                    .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
