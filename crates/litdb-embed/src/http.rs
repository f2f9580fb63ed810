//! OpenAI-compatible embedding provider.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use litdb_core::traits::Embedder;
use litdb_core::{Error, Result};

use crate::l2_normalize;

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL up to and excluding `/embeddings` (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Width every returned vector must have.
    pub dimension: usize,
    pub timeout: Duration,
    /// L2-normalize returned vectors.
    pub normalize: bool,
}

pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
    id: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

fn unavailable(e: reqwest::Error) -> Error {
    Error::ProviderUnavailable(e.to_string())
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(unavailable)?;
        let id = format!("http:{}:d{}", config.model, config.dimension);
        Ok(Self { client, config, id })
    }
}

impl Embedder for HttpEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.config.dimension }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&EmbeddingRequest { input: texts, model: &self.config.model });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().map_err(unavailable)?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Error::ProviderUnavailable(format!("{url} answered {status}")));
        }
        if !status.is_success() {
            return Err(Error::InvalidArgument(format!("{url} rejected the request with {status}")));
        }
        let body: EmbeddingResponse = response.json().map_err(unavailable)?;
        if body.data.len() != texts.len() {
            return Err(Error::ProviderUnavailable(format!(
                "provider returned {} vectors for {} texts", body.data.len(), texts.len()
            )));
        }

        let mut data = body.data;
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.config.dimension {
                return Err(Error::DimensionMismatch { expected: self.config.dimension, actual: item.embedding.len() });
            }
            let mut v = item.embedding;
            if self.config.normalize { l2_normalize(&mut v); }
            vectors.push(v);
        }
        debug!(count = vectors.len(), "embedded batch over http");
        Ok(vectors)
    }
}
