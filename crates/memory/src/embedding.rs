//! Embedding generation for vector search.
//!
//! Vectors come from an OpenAI-compatible `/v1/embeddings` endpoint. The
//! default model is `text-embedding-3-small` (1536 dimensions), which is the
//! size the Qdrant collection is created with.

use async_trait::async_trait;
use medhist_common::{MedHistError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Turns text into a fixed-size vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible embeddings API.
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: Option<String>,
        model: String,
        dimension: usize,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            dimension,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| MedHistError::Memory(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(MedHistError::Memory(format!(
                "Embedding API error {status}: {body_text}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            MedHistError::Memory(format!("Failed to parse embedding response: {e}"))
        })?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MedHistError::Memory("Empty embedding result".into()))?;

        if embedding.len() != self.dimension {
            return Err(MedHistError::Memory(format!(
                "Dimension mismatch: model '{}' returned {}-dim vector but {} was configured",
                self.model,
                embedding.len(),
                self.dimension
            )));
        }

        debug!(dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
