//! External provider boundaries: embeddings and answer generation.
//!
//! Both collaborators sit behind one-method async traits so pipelines can be
//! exercised against deterministic mocks. The HTTP-backed implementations
//! live in [`http`]; the mocks here are exported from the library (not test
//! code) so integration tests and demos can share them.

pub mod http;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::types::RagError;

pub use http::{HttpAnswerGenerator, HttpEmbeddingProvider};

/// Turns text into a fixed-length embedding vector.
///
/// A provider failure surfaces as [`RagError::Provider`]; it is never mapped
/// to a zero vector, because zero-norm vectors are unsearchable and would
/// silently poison the store.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Output dimensionality shared by every vector this provider emits.
    fn dimensions(&self) -> usize;
}

/// Produces the final answer text from retrieved context and a question.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, context: &str, question: &str) -> Result<String, RagError>;
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Vectors are seeded from a digest of the input text: identical text always
/// produces an identical vector, different texts diverge. Specific inputs
/// can be scripted to fail, which is how partial-failure ingestion paths are
/// exercised.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    fail_on: Vec<String>,
}

impl MockEmbeddingProvider {
    pub const DEFAULT_DIMENSIONS: usize = 16;

    pub fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
            fail_on: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Scripts a failure for any input containing `needle`.
    #[must_use]
    pub fn fail_on_contains(mut self, needle: impl Into<String>) -> Self {
        self.fail_on.push(needle.into());
        self
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if let Some(needle) = self.fail_on.iter().find(|n| text.contains(n.as_str())) {
            return Err(RagError::provider(format!(
                "scripted embedding failure for input containing {needle:?}"
            )));
        }
        let digest = md5::compute(text.as_bytes());
        let vector = (0..self.dimensions)
            .map(|i| {
                let byte = digest.0[i % digest.0.len()];
                let mixed = byte.wrapping_add((i as u8).wrapping_mul(31));
                f32::from(mixed) / 127.5 - 1.0
            })
            .collect();
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic answer generator for tests.
///
/// Mirrors the shape of a real generator's behavior: with context it echoes
/// the question against the context size, without context it reports that it
/// cannot answer. Tracks how often it was invoked so tests can assert the
/// query pipeline always reaches the generation stage.
#[derive(Debug, Default)]
pub struct MockAnswerGenerator {
    fail: bool,
    calls: AtomicUsize,
}

impl MockAnswerGenerator {
    /// Answer returned when no context was retrieved.
    pub const NO_CONTEXT_ANSWER: &'static str =
        "I don't have enough information to answer that question";

    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose every call fails with a provider error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for MockAnswerGenerator {
    async fn generate(&self, context: &str, question: &str) -> Result<String, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::provider("scripted generator failure"));
        }
        if context.trim().is_empty() {
            return Ok(Self::NO_CONTEXT_ANSWER.to_string());
        }
        Ok(format!(
            "Answer to '{question}' drawn from {} characters of context",
            context.chars().count()
        ))
    }
}
