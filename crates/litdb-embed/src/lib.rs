//! Embedding providers behind the [`litdb_core::traits::Embedder`] capability.
//!
//! - [`HashEmbedder`]: deterministic feature hashing, no model required
//! - [`HttpEmbedder`]: OpenAI-compatible `/embeddings` endpoint
//! - [`RetryingEmbedder`]: bounded retry with exponential backoff around any provider
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use twox_hash::XxHash64;

use litdb_core::config::EmbeddingSettings;
use litdb_core::traits::Embedder;
use litdb_core::{Error, Result};

pub mod http;
pub mod retry;

pub use http::{HttpEmbedder, HttpEmbedderConfig};
pub use retry::{RetryPolicy, RetryingEmbedder};

/// Scale `v` to unit length in place; zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 { for x in v.iter_mut() { *x /= norm; } }
}

/// Hashes lower-cased whitespace tokens into `dim` buckets.
pub struct HashEmbedder { dim: usize, id: String }

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidArgument("hash embedder dimension must be positive".into()));
        }
        Ok(Self { dim, id: format!("hash:xxh64:d{dim}") })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += sign * (0.5 + val);
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the provider named by `settings.provider`, wrapping remote
/// providers in the retry layer.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.dim == 0 {
        return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
    }
    match settings.provider.as_str() {
        "hash" => {
            info!(dim = settings.dim, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(settings.dim)?))
        }
        "http" => {
            let config = HttpEmbedderConfig {
                base_url: settings.base_url.clone(),
                model: settings.model.clone(),
                api_key: settings.api_key.clone(),
                dimension: settings.dim,
                timeout: Duration::from_secs(settings.timeout_secs),
                normalize: true,
            };
            info!(base_url = %config.base_url, model = %config.model, "using http embedder");
            let policy = RetryPolicy {
                max_retries: settings.max_retries,
                base_delay: Duration::from_millis(settings.retry_base_delay_ms),
                ..RetryPolicy::default()
            };
            Ok(Arc::new(RetryingEmbedder::new(Arc::new(HttpEmbedder::new(config)?), policy)))
        }
        other => Err(Error::InvalidConfig(format!("unknown embedding provider '{other}'"))),
    }
}
