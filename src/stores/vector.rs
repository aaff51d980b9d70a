//! SQLite-backed vector store with brute-force cosine ranking.
//!
//! One row per chunk in the `chunks` table; embeddings are stored as
//! little-endian f32 blobs and ranked in process. `similarity_search` is a
//! full linear scan per query, O(rows) by design: acceptable for small
//! corpora and deliberately unindexed. An approximate index is the obvious
//! next step if the corpus outgrows this, but is out of scope here.

use std::cmp::Ordering;
use std::path::Path;

use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::types::RagError;

use super::VectorRecord;

/// A record paired with its cosine similarity to a query vector.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub similarity: f32,
}

/// Persistent keyed collection of [`VectorRecord`]s.
///
/// The handle clones cheaply; the underlying connection serializes access,
/// so a clone per worker is the intended concurrency model. Searches read an
/// unlocked snapshot and may observe an in-progress ingestion partially —
/// accepted as eventual consistency.
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) the store at `path`.
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
                "CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    embedding BLOB NOT NULL,
                    source TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    metadata TEXT NOT NULL DEFAULT '{}'
                );
                CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;
        info!("vector store ready");
        Ok(Self { conn })
    }

    /// Creates or overwrites the record under its id; last write wins.
    /// Safe to call repeatedly with the same id.
    pub async fn upsert(&self, record: VectorRecord) -> Result<(), RagError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chunks (id, content, embedding, source, chunk_index, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        content = excluded.content,
                        embedding = excluded.embedding,
                        source = excluded.source,
                        chunk_index = excluded.chunk_index,
                        metadata = excluded.metadata",
                    (
                        &record.id,
                        &record.content,
                        encode_vector(&record.vector),
                        &record.source,
                        record.chunk_index as i64,
                        record.metadata.to_string(),
                    ),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Deletes every record, returning the number removed. Not atomic: an
    /// interruption mid-clear can leave a partial set behind.
    pub async fn clear(&self) -> Result<usize, RagError> {
        let deleted = self
            .conn
            .call(|conn| {
                conn.execute("DELETE FROM chunks", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        info!(deleted, "cleared vector store");
        Ok(deleted)
    }

    /// Deletes every record for one source, returning the number removed.
    pub async fn delete_by_source(&self, source: &str) -> Result<usize, RagError> {
        let source = source.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                conn.execute("DELETE FROM chunks WHERE source = ?1", [&source])
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Ok(deleted)
    }

    /// Number of stored records. Degrades to 0 with a warning if the store
    /// is unreadable, keeping the read path panic- and error-free.
    pub async fn count(&self) -> usize {
        let result = self
            .conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await;
        match result {
            Ok(count) => count as usize,
            Err(err) => {
                warn!(error = %err, "vector store count failed; reporting 0");
                0
            }
        }
    }

    /// Fetches one record by id. Degrades to `None` on storage failure.
    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        let id = id.to_string();
        let result = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, content, embedding, source, chunk_index, metadata
                         FROM chunks WHERE id = ?1",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                stmt.query_row([&id], |row| {
                    Ok(VectorRecord {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        vector: decode_vector(&row.get::<_, Vec<u8>>(2)?),
                        source: row.get(3)?,
                        chunk_index: row.get::<_, i64>(4)?.max(0) as usize,
                        metadata: row
                            .get::<_, String>(5)
                            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                            .unwrap_or_default(),
                    })
                })
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await;
        match result {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "vector store lookup failed");
                None
            }
        }
    }

    /// Ranks the full record set by cosine similarity to `query` and returns
    /// the top `k` (all records when fewer exist). Records whose vector has
    /// zero norm, mismatched dimensionality, or non-finite values are
    /// skipped; ties keep retrieval order (stable sort). Degrades to an
    /// empty result on storage failure.
    pub async fn similarity_search(&self, query: &[f32], k: usize) -> Vec<ScoredRecord> {
        if k == 0 {
            return Vec::new();
        }
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, content, embedding, source, chunk_index, metadata
                         FROM chunks ORDER BY rowid",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mapped = stmt
                    .query_map([], |row| {
                        Ok(VectorRecord {
                            id: row.get(0)?,
                            content: row.get(1)?,
                            vector: decode_vector(&row.get::<_, Vec<u8>>(2)?),
                            source: row.get(3)?,
                            chunk_index: row.get::<_, i64>(4)?.max(0) as usize,
                            metadata: row
                                .get::<_, String>(5)
                                .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                                .unwrap_or_default(),
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

        let records = match rows {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "similarity search failed; returning no results");
                return Vec::new();
            }
        };

        let scanned = records.len();
        let mut scored: Vec<ScoredRecord> = records
            .into_iter()
            .filter_map(|record| {
                cosine_similarity(query, &record.vector)
                    .map(|similarity| ScoredRecord { record, similarity })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);
        debug!(scanned, returned = scored.len(), "similarity search complete");
        scored
    }
}

/// Cosine similarity `dot(a,b) / (|a|·|b|)`, accumulated in f64.
///
/// Returns `None` when similarity is undefined: mismatched or empty
/// dimensions, a zero-norm operand, or non-finite values.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let similarity = dot / denom;
    if similarity.is_finite() {
        Some(similarity as f32)
    } else {
        None
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}
