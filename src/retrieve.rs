//! Query-side retrieval: question text to ranked chunks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::providers::EmbeddingProvider;
use crate::stores::{ScoredRecord, SqliteVectorStore};
use crate::types::RagError;

/// Turns a query into ranked chunks. One method, no inheritance; anything
/// that can produce ranked records can stand in for the default
/// store-backed implementation.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>, RagError>;
}

/// Embeds the query once and ranks the vector store against it.
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: SqliteVectorStore,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: SqliteVectorStore) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>, RagError> {
        let embedding = self.embedder.embed(query).await?;
        Ok(self.store.similarity_search(&embedding, k).await)
    }
}
