//! Core domain types shared across the ingestion and query pipelines.
//!
//! Everything here is plain data: the document tuple handed in by the
//! scraper boundary, the answer envelope handed back to the request layer,
//! and the [`RagError`] taxonomy every fallible operation reports through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A source document as delivered by the (external) scraper boundary.
///
/// Immutable once handed to ingestion: the pipeline never rewrites the raw
/// text, only derives chunks from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceDocument {
    /// URL-like source identifier; the basis for deterministic chunk ids.
    pub source: String,
    /// Human-readable document title.
    pub title: String,
    /// Raw extracted text.
    pub text: String,
    /// Scrape timestamp, opaque to this crate.
    pub timestamp: String,
}

impl SourceDocument {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Final response of the query pipeline.
///
/// `sources` is deduplicated and order-stable: the first retrieval hit for a
/// given source determines its position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
    pub source_count: usize,
}

impl Answer {
    /// Builds the degraded response used when any stage of the query
    /// pipeline fails. The failure becomes part of the answer text rather
    /// than an error crossing the subsystem boundary.
    pub fn degraded(err: &RagError) -> Self {
        Self {
            answer: format!("Error processing question: {err}"),
            sources: Vec::new(),
            source_count: 0,
        }
    }
}

/// Error taxonomy for the ingestion/storage/retrieval subsystem.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or malformed configuration. Fatal at startup, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding or generation provider failure. `retryable` tells the
    /// caller whether another attempt is worthwhile.
    #[error("provider error: {message}")]
    Provider { message: String, retryable: bool },

    /// Store connection or write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Text splitting failure (bad chunker configuration).
    #[error("chunking error: {0}")]
    Chunking(String),

    /// Filesystem-level failure.
    #[error("io error: {0}")]
    Io(String),
}

impl RagError {
    /// Shorthand for a retryable provider failure.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            retryable: true,
        }
    }

    /// Shorthand for a provider failure that should not be retried.
    pub fn provider_fatal(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether a retry of the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { retryable: true, .. })
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for RagError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level failures (connect, timeout) are worth retrying.
        Self::Provider {
            message: err.to_string(),
            retryable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_answer_carries_failure_text() {
        let err = RagError::provider("embedding endpoint unreachable");
        let answer = Answer::degraded(&err);
        assert!(answer.answer.contains("embedding endpoint unreachable"));
        assert!(answer.sources.is_empty());
        assert_eq!(answer.source_count, 0);
    }

    #[test]
    fn retryable_classification() {
        assert!(RagError::provider("timeout").is_retryable());
        assert!(!RagError::provider_fatal("bad request").is_retryable());
        assert!(!RagError::Config("missing key".into()).is_retryable());
    }
}
