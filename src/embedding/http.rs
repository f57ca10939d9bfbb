//! HTTP embedding client.

use super::Embedder;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// The dimension is unknown until the first successful call; the vector
/// store probes it during collection bootstrap by embedding a test string.
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
    probed_dimensions: OnceLock<usize>,
}

impl HttpEmbedder {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates an embedder for the given endpoint base URL and model.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client,
            probed_dimensions: OnceLock::new(),
        }
    }
}

impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.probed_dimensions.get().copied().unwrap_or(0)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/v1/embeddings",
            self.endpoint.trim_end_matches('/')
        );
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| Error::operation("embedding_request", e))?;

        if !response.status().is_success() {
            return Err(Error::operation(
                "embedding_request",
                format!("endpoint returned status {}", response.status()),
            ));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| Error::operation("embedding_response", e))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| {
                Error::operation("embedding_response", "no embeddings in response")
            })?;

        if embedding.is_empty() {
            return Err(Error::operation(
                "embedding_response",
                "embedding generation returned empty vector",
            ));
        }

        let _ = self.probed_dimensions.set(embedding.len());
        Ok(embedding)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}
