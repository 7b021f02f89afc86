//! OpenAI-compatible embedding provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EmbeddingError;
use crate::{DEFAULT_DIMENSION, DEFAULT_EMBEDDING_MODEL};

/// Source of embedding vectors.
///
/// Implementations must be thread-safe (Send + Sync) for shared use behind
/// an `Arc`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Callers are expected to skip empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimension of the vectors this provider returns.
    fn dimension(&self) -> usize;
}

/// Configuration for the OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Embedding model to request
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Expected vector dimension for the chosen model
    pub dimension: usize,
}

impl OpenAiConfig {
    /// Config for the OpenAI API with the default embedding model.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(30),
            dimension: DEFAULT_DIMENSION,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Embedding provider backed by the OpenAI embeddings API.
///
/// One request per call, no retries: pacing and retry policy belong to
/// callers, not this client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiEmbedder {
    /// Create a new client with the configured timeout.
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.config.base_url);
        let request = EmbeddingsRequest {
            model: &self.config.model,
            input: text,
        };

        debug!(model = %self.config.model, chars = text.len(), "Requesting embedding");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Parse("missing embedding data".to_string()))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_config_defaults() {
        let config = OpenAiConfig::openai("test-key");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.dimension, DEFAULT_DIMENSION);
    }

    #[test]
    fn test_openai_config_builders() {
        let config = OpenAiConfig::openai("test-key")
            .with_base_url("http://localhost:9900/v1")
            .with_model("text-embedding-3-large")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "http://localhost:9900/v1");
        assert_eq!(config.model, "text-embedding-3-large");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_embedder_construction() {
        let embedder = OpenAiEmbedder::new(OpenAiConfig::openai("test-key")).unwrap();
        assert_eq!(embedder.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingsRequest {
            model: "text-embedding-3-small",
            input: "Energy Corp ENRG",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"], "Energy Corp ENRG");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"data": [{"embedding": [0.1, -0.2, 0.3]}], "model": "x", "usage": {}}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_response_missing_data_is_parse_error() {
        let body = r#"{"data": []}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(body).unwrap();
        let result: Result<Vec<f32>, EmbeddingError> = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Parse("missing embedding data".to_string()));
        assert!(matches!(result, Err(EmbeddingError::Parse(_))));
    }
}
