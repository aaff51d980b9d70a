//! End-to-end tests for the ingestion and query pipelines over in-memory
//! stores with mock providers, suitable for CI and deterministic runs.

use std::sync::Arc;

use ragkeep::{
    chunk_id, IngestionPipeline, MockAnswerGenerator, MockEmbeddingProvider, RagEngine,
    SqliteMetadataStore, SqliteVectorStore, SourceDocument, TextChunker, VectorRetriever,
};
use tracing_subscriber::EnvFilter;

/// Routes pipeline logs through the test harness; `RUST_LOG` filters them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn make_stores() -> (SqliteVectorStore, SqliteMetadataStore) {
    init_tracing();
    let vectors = SqliteVectorStore::open_in_memory()
        .await
        .expect("vector store");
    let metadata = SqliteMetadataStore::open_in_memory()
        .await
        .expect("metadata store");
    (vectors, metadata)
}

fn make_pipeline(
    embedder: Arc<MockEmbeddingProvider>,
    vectors: SqliteVectorStore,
    metadata: SqliteMetadataStore,
) -> IngestionPipeline {
    // Large chunk size so short fixtures stay single-chunk unless a test
    // wants otherwise.
    let chunker = TextChunker::new(512, 64).expect("chunker");
    IngestionPipeline::new(chunker, embedder, vectors, metadata)
}

#[tokio::test]
async fn single_document_lands_in_both_stores_with_derived_id() {
    let (vectors, metadata) = make_stores().await;
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let pipeline = make_pipeline(embedder, vectors.clone(), metadata.clone());

    let doc = SourceDocument::new(
        "https://docs.example.com/a",
        "Page A",
        "A short page about pipeline behaviour.",
        "2026-08-30T00:00:00Z",
    );
    let report = pipeline.ingest(&[doc], false).await.expect("ingest");

    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks_attempted, 1);
    assert_eq!(report.chunks_stored, 1);
    assert_eq!(report.chunks_failed, 0);
    assert!(report.is_complete());

    let id = chunk_id("https://docs.example.com/a", 0);
    assert_eq!(
        id,
        format!("{:x}_chunk_0", md5::compute("https://docs.example.com/a"))
    );

    let record = vectors.get(&id).await.expect("stored vector record");
    assert_eq!(record.source, "https://docs.example.com/a");
    assert_eq!(record.chunk_index, 0);
    assert_eq!(record.content, "A short page about pipeline behaviour.");
    assert_eq!(
        record.vector.len(),
        MockEmbeddingProvider::DEFAULT_DIMENSIONS
    );

    let meta = metadata.get(&id).await.expect("stored metadata record");
    assert_eq!(meta.source_url, "https://docs.example.com/a");
    assert_eq!(meta.total_chunks, 1);

    assert_eq!(vectors.count().await, 1);
    assert_eq!(metadata.count().await, 1);
}

#[tokio::test]
async fn failed_chunk_is_skipped_and_reported() {
    let (vectors, metadata) = make_stores().await;
    let embedder = Arc::new(MockEmbeddingProvider::new().fail_on_contains("poison"));
    let pipeline = make_pipeline(embedder, vectors.clone(), metadata.clone());

    let docs = vec![
        SourceDocument::new("https://x/good-1", "G1", "first healthy page", "t"),
        SourceDocument::new("https://x/bad", "B", "a poison page", "t"),
        SourceDocument::new("https://x/good-2", "G2", "second healthy page", "t"),
    ];
    let report = pipeline.ingest(&docs, false).await.expect("ingest");

    assert_eq!(report.chunks_attempted, 3);
    assert_eq!(report.chunks_stored, 2);
    assert_eq!(report.chunks_failed, 1);
    assert!(!report.is_complete());

    // The failed chunk appears in neither store; its siblings are intact.
    assert!(vectors.get(&chunk_id("https://x/bad", 0)).await.is_none());
    assert!(metadata.get(&chunk_id("https://x/bad", 0)).await.is_none());
    assert!(vectors.get(&chunk_id("https://x/good-1", 0)).await.is_some());
    assert!(vectors.get(&chunk_id("https://x/good-2", 0)).await.is_some());
    assert_eq!(vectors.count().await, 2);
    assert_eq!(metadata.count().await, 2);
}

#[tokio::test]
async fn full_reload_drops_documents_absent_from_the_new_batch() {
    let (vectors, metadata) = make_stores().await;
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let pipeline = make_pipeline(embedder, vectors.clone(), metadata.clone());

    let old = SourceDocument::new("https://x/stale", "Stale", "old content", "t0");
    let new = SourceDocument::new("https://x/fresh", "Fresh", "new content", "t1");
    pipeline.ingest(&[old], false).await.expect("first ingest");
    pipeline.ingest(&[new], true).await.expect("reload ingest");

    assert!(vectors.get(&chunk_id("https://x/stale", 0)).await.is_none());
    assert!(vectors.get(&chunk_id("https://x/fresh", 0)).await.is_some());
    assert_eq!(vectors.count().await, 1);
    assert_eq!(metadata.count().await, 1);
    assert!(metadata.get(&chunk_id("https://x/stale", 0)).await.is_none());
}

#[tokio::test]
async fn reingest_without_reload_overwrites_in_place() {
    let (vectors, metadata) = make_stores().await;
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let pipeline = make_pipeline(embedder, vectors.clone(), metadata.clone());

    let v1 = SourceDocument::new("https://x/page", "Page", "first draft", "t0");
    let v2 = SourceDocument::new("https://x/page", "Page", "second draft", "t1");
    pipeline.ingest(&[v1], false).await.expect("first ingest");
    pipeline.ingest(&[v2], false).await.expect("second ingest");

    // Same source, same index, same id: the row is replaced, not duplicated.
    assert_eq!(vectors.count().await, 1);
    assert_eq!(metadata.count().await, 1);
    let record = vectors
        .get(&chunk_id("https://x/page", 0))
        .await
        .expect("record");
    assert_eq!(record.content, "second draft");
}

#[tokio::test]
async fn ask_over_ingested_corpus_returns_deduplicated_sources() {
    let (vectors, metadata) = make_stores().await;
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let pipeline = make_pipeline(embedder.clone(), vectors.clone(), metadata);

    let docs = vec![
        SourceDocument::new(
            "https://x/a",
            "A",
            "Chunking splits documents into overlapping windows.",
            "t",
        ),
        SourceDocument::new(
            "https://x/b",
            "B",
            "Retrieval ranks stored chunks by cosine similarity.",
            "t",
        ),
    ];
    pipeline.ingest(&docs, false).await.expect("ingest");

    let generator = Arc::new(MockAnswerGenerator::new());
    let retriever = Arc::new(VectorRetriever::new(embedder, vectors));
    let engine = RagEngine::new(retriever, generator.clone());

    let answer = engine
        .ask("Chunking splits documents into overlapping windows.")
        .await;

    assert_eq!(generator.call_count(), 1);
    assert_eq!(answer.source_count, answer.sources.len());
    assert_eq!(answer.sources.len(), 2);
    // Exact-text query: its own document must rank first.
    assert_eq!(answer.sources[0], "https://x/a");
}

#[tokio::test]
async fn ask_on_empty_store_still_generates_with_no_sources() {
    let (vectors, _metadata) = make_stores().await;
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let generator = Arc::new(MockAnswerGenerator::new());
    let retriever = Arc::new(VectorRetriever::new(embedder, vectors));
    let engine = RagEngine::new(retriever, generator.clone());

    let answer = engine.ask("anything at all?").await;

    assert_eq!(generator.call_count(), 1);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.source_count, 0);
    assert_eq!(answer.answer, MockAnswerGenerator::NO_CONTEXT_ANSWER);
}

#[tokio::test]
async fn multi_chunk_document_persists_every_index_on_disk() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let vectors = SqliteVectorStore::open(dir.path().join("vectors.db"))
        .await
        .expect("vector store");
    let metadata = SqliteMetadataStore::open(dir.path().join("metadata.db"))
        .await
        .expect("metadata store");
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let chunker = TextChunker::new(40, 10).expect("chunker");
    let pipeline = IngestionPipeline::new(chunker, embedder, vectors.clone(), metadata.clone());

    let text = "one two three four five six seven eight nine ten \
                eleven twelve thirteen fourteen fifteen sixteen";
    let doc = SourceDocument::new("https://x/long", "Long", text, "t");
    let report = pipeline.ingest(&[doc], false).await.expect("ingest");

    assert!(report.chunks_attempted > 1);
    assert!(report.is_complete());
    assert_eq!(vectors.count().await, report.chunks_stored);

    for index in 0..report.chunks_stored {
        let id = chunk_id("https://x/long", index);
        let record = vectors.get(&id).await.expect("chunk present");
        assert_eq!(record.chunk_index, index);
        let meta = metadata.get(&id).await.expect("metadata present");
        assert_eq!(meta.total_chunks, report.chunks_stored);
    }
}
