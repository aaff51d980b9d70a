//! Environment-backed configuration.
//!
//! Settings resolve from the process environment (after loading `.env` via
//! dotenvy) with sensible defaults for everything except provider
//! credentials. Malformed values are configuration errors, fatal at startup.

use std::str::FromStr;

use crate::types::RagError;

/// Runtime settings for stores, chunking, and providers.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// SQLite file backing the vector store.
    pub db_path: String,
    /// SQLite file backing the metadata store. May equal `db_path`; the two
    /// stores use separate tables and remain logically independent.
    pub metadata_db_path: String,
    /// Maximum chunk length, in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Cap on simultaneous in-flight embedding calls during ingestion.
    pub ingest_concurrency: usize,
    /// Provider API key; required only when constructing HTTP providers.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chat_model: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            db_path: "ragkeep.db".to_string(),
            metadata_db_path: "ragkeep.db".to_string(),
            chunk_size: 1024,
            chunk_overlap: 180,
            top_k: 7,
            ingest_concurrency: 4,
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimensions: 1536,
            chat_model: "gpt-4-turbo-preview".to_string(),
        }
    }
}

impl RagConfig {
    /// Resolves configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let db_path = std::env::var("RAGKEEP_DB_PATH").unwrap_or(defaults.db_path);
        let metadata_db_path =
            std::env::var("RAGKEEP_METADATA_DB_PATH").unwrap_or_else(|_| db_path.clone());

        let api_base = std::env::var("RAGKEEP_API_BASE").unwrap_or(defaults.api_base);
        url::Url::parse(&api_base)
            .map_err(|err| RagError::Config(format!("invalid RAGKEEP_API_BASE {api_base:?}: {err}")))?;

        Ok(Self {
            metadata_db_path,
            chunk_size: parse_var(
                "RAGKEEP_CHUNK_SIZE",
                std::env::var("RAGKEEP_CHUNK_SIZE").ok(),
                defaults.chunk_size,
            )?,
            chunk_overlap: parse_var(
                "RAGKEEP_CHUNK_OVERLAP",
                std::env::var("RAGKEEP_CHUNK_OVERLAP").ok(),
                defaults.chunk_overlap,
            )?,
            top_k: parse_var(
                "RAGKEEP_TOP_K",
                std::env::var("RAGKEEP_TOP_K").ok(),
                defaults.top_k,
            )?,
            ingest_concurrency: parse_var(
                "RAGKEEP_INGEST_CONCURRENCY",
                std::env::var("RAGKEEP_INGEST_CONCURRENCY").ok(),
                defaults.ingest_concurrency,
            )?,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            api_base,
            embedding_model: std::env::var("RAGKEEP_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimensions: parse_var(
                "RAGKEEP_EMBEDDING_DIMENSIONS",
                std::env::var("RAGKEEP_EMBEDDING_DIMENSIONS").ok(),
                defaults.embedding_dimensions,
            )?,
            chat_model: std::env::var("RAGKEEP_CHAT_MODEL").unwrap_or(defaults.chat_model),
            db_path,
        })
    }
}

/// Parses an optional raw environment value, treating malformed input as a
/// fatal configuration error rather than silently using the default.
fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, RagError> {
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| RagError::Config(format!("invalid value for {key}: {value:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.chunk_overlap, 180);
        assert_eq!(config.top_k, 7);
        assert_eq!(config.ingest_concurrency, 4);
        assert_eq!(config.metadata_db_path, config.db_path);
        assert!(config.api_key.is_none());
        assert!(url::Url::parse(&config.api_base).is_ok());
    }

    #[test]
    fn parse_var_falls_back_and_rejects_garbage() {
        assert_eq!(parse_var::<usize>("K", None, 7).unwrap(), 7);
        assert_eq!(parse_var::<usize>("K", Some("12".into()), 7).unwrap(), 12);
        let err = parse_var::<usize>("K", Some("twelve".into()), 7).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
        assert!(err.to_string().contains("K"));
    }
}
