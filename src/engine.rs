//! Query pipeline: question in, [`Answer`] out, failures absorbed.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RagConfig;
use crate::providers::AnswerGenerator;
use crate::retrieve::Retriever;
use crate::types::{Answer, RagError};

/// Front door of the query side.
///
/// `ask` never returns an error: any failure along the
/// embed → search → generate chain degrades into an [`Answer`] whose text
/// explains the problem, keeping the caller's contract uniform.
pub struct RagEngine {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
}

impl RagEngine {
    /// Default number of chunks retrieved per question.
    pub const DEFAULT_TOP_K: usize = 7;

    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            retriever,
            generator,
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Wires an engine from configuration, applying the configured `top_k`.
    pub fn from_config(
        config: &RagConfig,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self::new(retriever, generator).with_top_k(config.top_k)
    }

    /// Answers a question from the stored corpus.
    ///
    /// An empty store is not a failure: the generator still runs with empty
    /// context and the response carries no sources.
    pub async fn ask(&self, question: &str) -> Answer {
        match self.answer(question).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "query pipeline degraded");
                Answer::degraded(&err)
            }
        }
    }

    async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        let hits = self.retriever.retrieve(question, self.top_k).await?;

        // Deduplicate sources, first retrieval hit fixing the order.
        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for hit in &hits {
            if seen.insert(hit.record.source.clone()) {
                sources.push(hit.record.source.clone());
            }
        }

        let context = hits
            .iter()
            .map(|hit| hit.record.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let answer = self.generator.generate(&context, question).await?;
        info!(
            retrieved = hits.len(),
            sources = sources.len(),
            "question answered"
        );
        let source_count = sources.len();
        Ok(Answer {
            answer,
            sources,
            source_count,
        })
    }
}
