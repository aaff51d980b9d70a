//! HTTP-backed providers speaking the OpenAI-compatible wire format.
//!
//! Two clients ship here: an embeddings client (`POST /embeddings`) and a
//! chat-completion answer generator (`POST /chat/completions`). Transport
//! failures, 429s, and 5xx responses are reported as retryable provider
//! errors; other non-success statuses are not worth retrying.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::RagConfig;
use crate::types::RagError;

use super::{AnswerGenerator, EmbeddingProvider};

/// Prompt handed to the chat model, with retrieved context inlined.
const ANSWER_PROMPT: &str = "You are a helpful assistant. Use the provided context to answer \
questions accurately and comprehensively.

Instructions:
- Answer based ONLY on the provided context
- Be specific and detailed when possible
- If you don't find the answer in the context, say \"I don't have enough information to answer that question\"

Context: {context}

Question: {question}

Answer:";

fn classify_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

async fn error_from_response(
    operation: &str,
    response: reqwest::Response,
) -> RagError {
    let status = response.status();
    let retryable = classify_status(status);
    let body = response.text().await.unwrap_or_default();
    RagError::Provider {
        message: format!("{operation} request failed with {status}: {body}"),
        retryable,
    }
}

/// Embedding client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }

    /// Points the client at a different OpenAI-compatible endpoint.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Builds the provider from configuration; a missing API key is a fatal
    /// configuration error, not a retryable provider failure.
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is required".into()))?;
        Ok(Self::new(
            api_key,
            config.embedding_model.clone(),
            config.embedding_dimensions,
        )
        .with_api_base(config.api_base.clone()))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("embedding", response).await);
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| RagError::provider_fatal("embedding response contained no data"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Answer generator for OpenAI-compatible chat-completion endpoints.
///
/// Generation runs at temperature 0.0 so repeated queries over the same
/// retrieved context stay reproducible.
#[derive(Clone, Debug)]
pub struct HttpAnswerGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpAnswerGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Points the client at a different OpenAI-compatible endpoint.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is required".into()))?;
        Ok(Self::new(api_key, config.chat_model.clone()).with_api_base(config.api_base.clone()))
    }

    fn render_prompt(context: &str, question: &str) -> String {
        ANSWER_PROMPT
            .replace("{context}", context)
            .replace("{question}", question)
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    async fn generate(&self, context: &str, question: &str) -> Result<String, RagError> {
        let prompt = Self::render_prompt(context, question);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0.0,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("generation", response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::provider_fatal("chat response contained no choices"))
    }
}
