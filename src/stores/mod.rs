//! Persistent stores for chunk vectors and chunk provenance.
//!
//! Two independent SQLite-backed stores live here:
//!
//! ```text
//!                  ┌──────────────────────┐
//!  Ingestion ────► │  SqliteVectorStore   │ ──► similarity_search ──► Query
//!  (upsert both)   │  (chunks table)      │
//!             └──► │  SqliteMetadataStore │ ──► provenance lookups
//!                  │  (chunk_metadata)    │
//!                  └──────────────────────┘
//! ```
//!
//! The stores share record ids but nothing else: no transaction spans them,
//! and a writer crash between the two upserts leaves them divergent until
//! the next full clear-and-reingest reconciles them. Write operations return
//! `Result`; read operations degrade to empty/zero results and log, so the
//! query path always gets a well-formed response.

pub mod metadata;
pub mod vector;

use serde::{Deserialize, Serialize};

pub use metadata::{MetadataRecord, SqliteMetadataStore};
pub use vector::{ScoredRecord, SqliteVectorStore};

/// One persisted chunk: text, embedding, and provenance.
///
/// `id` is a pure function of `(source, chunk_index)`, so re-ingesting the
/// same source with the same chunking configuration overwrites these rows in
/// place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub source: String,
    pub chunk_index: usize,
    /// Free-form metadata copy (title, timestamp, anything the ingestion
    /// boundary wants to carry along).
    pub metadata: serde_json::Value,
}

impl VectorRecord {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        vector: Vec<f32>,
        source: impl Into<String>,
        chunk_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            vector,
            source: source.into(),
            chunk_index,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
