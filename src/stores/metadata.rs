//! SQLite-backed store for chunk provenance records.
//!
//! Mirrors the vector store's operation shape over `chunk_metadata` rows,
//! keyed by chunk id. Writes never touch the vector store and vice versa;
//! the two record sets are reconciled only by a full clear-and-reingest.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::types::RagError;

/// Default language tag recorded when the caller does not supply one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Provenance for one chunk: where it came from, how many siblings it has,
/// and when it was recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Equals `chunk_id`; kept as a separate column so the row shape matches
    /// the persisted document format.
    pub id: String,
    pub chunk_id: String,
    pub source_url: String,
    pub total_chunks: usize,
    pub language: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Persistent keyed collection of [`MetadataRecord`]s.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Connection,
}

impl SqliteMetadataStore {
    /// Opens (or creates) the store at `path`. The path may be shared with
    /// the vector store; the tables are distinct.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::initialize(conn).await
    }

    /// Opens an ephemeral in-memory store, used by tests and demos.
    pub async fn open_in_memory() -> Result<Self, RagError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self, RagError> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunk_metadata (
                    id TEXT PRIMARY KEY,
                    chunk_id TEXT NOT NULL,
                    source_url TEXT NOT NULL,
                    total_chunks INTEGER NOT NULL,
                    language TEXT NOT NULL DEFAULT 'en',
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_chunk_metadata_source
                    ON chunk_metadata(source_url);",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;
        info!("metadata store ready");
        Ok(Self { conn })
    }

    /// Records provenance for a chunk, overwriting any prior entry under the
    /// same id. `language` defaults to [`DEFAULT_LANGUAGE`].
    pub async fn add(
        &self,
        chunk_id: &str,
        source_url: &str,
        total_chunks: usize,
        language: Option<&str>,
    ) -> Result<(), RagError> {
        let record = MetadataRecord {
            id: chunk_id.to_string(),
            chunk_id: chunk_id.to_string(),
            source_url: source_url.to_string(),
            total_chunks,
            language: language.unwrap_or(DEFAULT_LANGUAGE).to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chunk_metadata
                        (id, chunk_id, source_url, total_chunks, language, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        chunk_id = excluded.chunk_id,
                        source_url = excluded.source_url,
                        total_chunks = excluded.total_chunks,
                        language = excluded.language,
                        created_at = excluded.created_at",
                    (
                        &record.id,
                        &record.chunk_id,
                        &record.source_url,
                        record.total_chunks as i64,
                        &record.language,
                        &record.created_at,
                    ),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Fetches provenance for one chunk. Degrades to `None` (with a warning)
    /// on storage failure; absence is an ordinary `None`, not an error.
    pub async fn get(&self, chunk_id: &str) -> Option<MetadataRecord> {
        let chunk_id = chunk_id.to_string();
        let result = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, chunk_id, source_url, total_chunks, language, created_at
                         FROM chunk_metadata WHERE id = ?1",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                stmt.query_row([&chunk_id], |row| {
                    Ok(MetadataRecord {
                        id: row.get(0)?,
                        chunk_id: row.get(1)?,
                        source_url: row.get(2)?,
                        total_chunks: row.get::<_, i64>(3)?.max(0) as usize,
                        language: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await;
        match result {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "metadata lookup failed");
                None
            }
        }
    }

    /// All provenance records, in insertion order. Degrades to empty.
    pub async fn get_all(&self) -> Vec<MetadataRecord> {
        self.query_records("SELECT id, chunk_id, source_url, total_chunks, language, created_at
             FROM chunk_metadata ORDER BY rowid", None)
            .await
    }

    /// Provenance records for one source. Degrades to empty.
    pub async fn get_by_source(&self, source_url: &str) -> Vec<MetadataRecord> {
        self.query_records(
            "SELECT id, chunk_id, source_url, total_chunks, language, created_at
             FROM chunk_metadata WHERE source_url = ?1 ORDER BY rowid",
            Some(source_url.to_string()),
        )
        .await
    }

    async fn query_records(&self, sql: &'static str, param: Option<String>) -> Vec<MetadataRecord> {
        let result = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql).map_err(tokio_rusqlite::Error::Rusqlite)?;
                let params: Vec<&str> = param.iter().map(String::as_str).collect();
                let mapped = stmt
                    .query_map(tokio_rusqlite::params_from_iter(params), |row| {
                        Ok(MetadataRecord {
                            id: row.get(0)?,
                            chunk_id: row.get(1)?,
                            source_url: row.get(2)?,
                            total_chunks: row.get::<_, i64>(3)?.max(0) as usize,
                            language: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut records = Vec::new();
                for row in mapped {
                    records.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(records)
            })
            .await;
        match result {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "metadata query failed; returning no records");
                Vec::new()
            }
        }
    }

    /// Deletes every record, returning the number removed. Not atomic.
    pub async fn clear(&self) -> Result<usize, RagError> {
        let deleted = self
            .conn
            .call(|conn| {
                conn.execute("DELETE FROM chunk_metadata", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        info!(deleted, "cleared metadata store");
        Ok(deleted)
    }

    /// Deletes every record for one source, returning the number removed.
    pub async fn delete_by_source(&self, source_url: &str) -> Result<usize, RagError> {
        let source_url = source_url.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM chunk_metadata WHERE source_url = ?1",
                    [&source_url],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Ok(deleted)
    }

    /// Number of stored records. Degrades to 0 on storage failure.
    pub async fn count(&self) -> usize {
        let result = self
            .conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM chunk_metadata", [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await;
        match result {
            Ok(count) => count as usize,
            Err(err) => {
                warn!(error = %err, "metadata count failed; reporting 0");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn add_and_get_round_trip_with_default_language() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        store.add("c0", "https://a", 3, None).await.unwrap();

        let record = store.get("c0").await.unwrap();
        assert_eq!(record.chunk_id, "c0");
        assert_eq!(record.source_url, "https://a");
        assert_eq!(record.total_chunks, 3);
        assert_eq!(record.language, DEFAULT_LANGUAGE);
        assert!(DateTime::parse_from_rfc3339(&record.created_at).is_ok());
    }

    #[tokio::test]
    async fn missing_record_is_plain_none() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        assert!(store.get("absent").await.is_none());
    }

    #[tokio::test]
    async fn add_upserts_without_growing_count() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        store.add("c0", "https://a", 1, None).await.unwrap();
        store.add("c0", "https://a", 5, Some("de")).await.unwrap();

        assert_eq!(store.count().await, 1);
        let record = store.get("c0").await.unwrap();
        assert_eq!(record.total_chunks, 5);
        assert_eq!(record.language, "de");
    }

    #[tokio::test]
    async fn get_by_source_filters_and_preserves_order() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        store.add("a0", "https://a", 2, None).await.unwrap();
        store.add("b0", "https://b", 1, None).await.unwrap();
        store.add("a1", "https://a", 2, None).await.unwrap();

        let records = store.get_by_source("https://a").await;
        let ids: Vec<_> = records.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, ["a0", "a1"]);
        assert_eq!(store.get_all().await.len(), 3);
    }

    #[tokio::test]
    async fn delete_by_source_and_clear() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        store.add("a0", "https://a", 2, None).await.unwrap();
        store.add("a1", "https://a", 2, None).await.unwrap();
        store.add("b0", "https://b", 1, None).await.unwrap();

        assert_eq!(store.delete_by_source("https://a").await.unwrap(), 2);
        assert_eq!(store.count().await, 1);
        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn reads_degrade_when_the_table_is_gone() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        store
            .conn
            .call(|conn| {
                conn.execute("DROP TABLE chunk_metadata", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .unwrap();

        assert_eq!(store.count().await, 0);
        assert!(store.get("x").await.is_none());
        assert!(store.get_all().await.is_empty());
        assert!(store.add("x", "https://a", 1, None).await.is_err());
    }
}
