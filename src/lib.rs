//! ragkeep: ingestion, vector storage, and retrieval for RAG question
//! answering over a scraped document corpus.
//!
//! ```text
//! Source Documents ──► ingest::IngestionPipeline
//!                          │  chunker::TextChunker
//!                          │  identity::chunk_id
//!                          │  providers::EmbeddingProvider
//!                          ├─► stores::SqliteVectorStore   (text + vectors)
//!                          └─► stores::SqliteMetadataStore (provenance)
//!
//! Question ──► engine::RagEngine::ask
//!                  │  retrieve::VectorRetriever (embed + cosine rank)
//!                  └─► providers::AnswerGenerator ──► Answer + sources
//! ```
//!
//! The two stores are written only by ingestion and read only by queries;
//! they share chunk ids but no transaction, and a full clear-and-reingest is
//! the reconciliation point for any divergence between them. Similarity
//! ranking is a brute-force cosine scan, a deliberate simplicity trade-off
//! for small corpora.
//!
//! Scraping, HTTP routing, and caller authentication live outside this
//! crate; documents arrive as ready-made [`types::SourceDocument`] tuples
//! and answers leave as [`types::Answer`] values.

pub mod chunker;
pub mod config;
pub mod engine;
pub mod identity;
pub mod ingest;
pub mod providers;
pub mod retrieve;
pub mod stores;
pub mod types;

pub use chunker::TextChunker;
pub use config::RagConfig;
pub use engine::RagEngine;
pub use identity::chunk_id;
pub use ingest::{IngestReport, IngestionPipeline};
pub use providers::{
    AnswerGenerator, EmbeddingProvider, HttpAnswerGenerator, HttpEmbeddingProvider,
    MockAnswerGenerator, MockEmbeddingProvider,
};
pub use retrieve::{Retriever, VectorRetriever};
pub use stores::{
    MetadataRecord, ScoredRecord, SqliteMetadataStore, SqliteVectorStore, VectorRecord,
};
pub use types::{Answer, RagError, SourceDocument};
