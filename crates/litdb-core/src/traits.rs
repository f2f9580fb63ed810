use std::path::Path;

use crate::types::DocumentRecord;
use crate::Result;

/// Maps text to fixed-width dense vectors.
///
/// Implementations must be deterministic for identical input text and
/// provider version, and should return L2-normalized vectors so that inner
/// product approximates cosine similarity.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:xxh64:d384`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Compute embeddings for a batch of input texts, one vector per text.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Turns one source file into a normalized [`DocumentRecord`].
pub trait Extractor: Send + Sync {
    /// Lower-case extensions (without the dot) this extractor handles.
    fn extensions(&self) -> &[&'static str];
    fn extract(&self, path: &Path) -> Result<DocumentRecord>;
}
