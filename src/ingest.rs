//! Batch ingestion: documents in, populated stores out.
//!
//! For every document the pipeline chunks the text, derives deterministic
//! chunk ids, embeds each chunk, and upserts one vector record plus one
//! metadata record. Embedding runs across a semaphore-bounded worker pool so
//! provider rate limits are respected; chunk ids and indexes are fixed
//! before dispatch, so completion order never affects identity.
//!
//! Failures are chunk-local: an embedding or store error skips that chunk
//! with a warning and the batch continues. The returned [`IngestReport`]
//! tallies stored versus attempted chunks. With no transaction spanning the
//! two stores, a crash between the paired upserts can leave them divergent;
//! the next full reload is the reconciliation point.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::chunker::TextChunker;
use crate::config::RagConfig;
use crate::identity::chunk_id;
use crate::providers::EmbeddingProvider;
use crate::stores::{SqliteMetadataStore, SqliteVectorStore, VectorRecord};
use crate::types::{RagError, SourceDocument};

/// Outcome summary for one ingestion batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents in the batch.
    pub documents: usize,
    /// Chunks produced by the chunker across all documents.
    pub chunks_attempted: usize,
    /// Chunks whose vector and metadata records were both written.
    pub chunks_stored: usize,
    /// Chunks skipped due to embedding or store failures.
    pub chunks_failed: usize,
}

impl IngestReport {
    /// True when every attempted chunk was stored.
    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0
    }
}

/// One unit of work: a chunk with its identity and provenance resolved.
struct ChunkTask {
    id: String,
    source: String,
    index: usize,
    total: usize,
    text: String,
    title: String,
    timestamp: String,
}

/// Orchestrates Chunker → identity → embedding → both stores.
///
/// Holds explicit store handles constructed at startup; there is no hidden
/// global state, so two pipelines over different stores can coexist.
pub struct IngestionPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: SqliteVectorStore,
    metadata: SqliteMetadataStore,
    concurrency: usize,
}

impl IngestionPipeline {
    /// Default cap on simultaneous in-flight embedding calls.
    pub const DEFAULT_CONCURRENCY: usize = 4;

    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: SqliteVectorStore,
        metadata: SqliteMetadataStore,
    ) -> Self {
        Self {
            chunker,
            embedder,
            vectors,
            metadata,
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    /// Wires a pipeline from configuration: chunker from the configured
    /// size/overlap, stores opened at the configured paths, concurrency cap
    /// applied. The embedding provider stays injected so callers choose
    /// between the HTTP client and a mock.
    pub async fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        let chunker = TextChunker::from_config(config)?;
        let vectors = SqliteVectorStore::open(&config.db_path).await?;
        let metadata = SqliteMetadataStore::open(&config.metadata_db_path).await?;
        Ok(Self::new(chunker, embedder, vectors, metadata)
            .with_concurrency(config.ingest_concurrency))
    }

    /// Caps the number of embedding calls in flight at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Ingests a batch of documents. With `full_reload` both stores are
    /// cleared first, making this the reconciliation point for any prior
    /// divergence between them.
    ///
    /// Only the reload clear can fail the whole call; chunk-level failures
    /// are absorbed into the report.
    pub async fn ingest(
        &self,
        documents: &[SourceDocument],
        full_reload: bool,
    ) -> Result<IngestReport, RagError> {
        if full_reload {
            let cleared_vectors = self.vectors.clear().await?;
            let cleared_metadata = self.metadata.clear().await?;
            info!(cleared_vectors, cleared_metadata, "cleared stores for full reload");
        }

        let mut tasks = Vec::new();
        for document in documents {
            let chunks = self.chunker.split(&document.text);
            let total = chunks.len();
            for (index, text) in chunks.into_iter().enumerate() {
                tasks.push(ChunkTask {
                    id: chunk_id(&document.source, index),
                    source: document.source.clone(),
                    index,
                    total,
                    text,
                    title: document.title.clone(),
                    timestamp: document.timestamp.clone(),
                });
            }
        }

        let chunks_attempted = tasks.len();
        info!(
            documents = documents.len(),
            chunks = chunks_attempted,
            "starting ingestion batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let embedder = Arc::clone(&self.embedder);
            let vectors = self.vectors.clone();
            let metadata = self.metadata.clone();
            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return false,
                };
                let id = task.id.clone();
                let source = task.source.clone();
                let index = task.index;
                match store_chunk(task, embedder, vectors, metadata).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(
                            chunk_id = %id,
                            source = %source,
                            chunk_index = index,
                            error = %err,
                            "skipping chunk"
                        );
                        false
                    }
                }
            });
        }

        let mut chunks_stored = 0usize;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(true) => chunks_stored += 1,
                Ok(false) => {}
                Err(err) => warn!(error = %err, "ingestion worker aborted"),
            }
        }

        let report = IngestReport {
            documents: documents.len(),
            chunks_attempted,
            chunks_stored,
            chunks_failed: chunks_attempted.saturating_sub(chunks_stored),
        };
        info!(
            stored = report.chunks_stored,
            attempted = report.chunks_attempted,
            "ingestion batch finished"
        );
        Ok(report)
    }
}

/// Embeds one chunk and writes its paired records, vector store first.
async fn store_chunk(
    task: ChunkTask,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: SqliteVectorStore,
    metadata: SqliteMetadataStore,
) -> Result<(), RagError> {
    let embedding = embedder.embed(&task.text).await?;
    let record = VectorRecord::new(
        task.id.clone(),
        task.text,
        embedding,
        task.source.clone(),
        task.index,
    )
    .with_metadata(json!({
        "source": task.source,
        "chunk_index": task.index,
        "title": task.title,
        "timestamp": task.timestamp,
    }));
    vectors.upsert(record).await?;
    metadata
        .add(&task.id, &task.source, task.total, None)
        .await?;
    Ok(())
}
