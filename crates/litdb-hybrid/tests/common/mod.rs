#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use litdb_core::traits::Embedder;
use litdb_core::types::DocumentRecord;
use litdb_core::{Error, Result};

pub const DIM: usize = 3;

/// Maps exact texts to fixed vectors; anything else embeds to zero.
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, [f32; DIM])]) -> Arc<Self> {
        let table = entries.iter().map(|(t, v)| (t.to_string(), v.to_vec())).collect();
        Arc::new(Self { table, calls: AtomicUsize::new(0) })
    }
}

impl Embedder for TableEmbedder {
    fn embedder_id(&self) -> &str { "table" }
    fn dim(&self) -> usize { DIM }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.table.get(t).cloned().unwrap_or_else(|| vec![0.0; DIM])).collect())
    }
}

/// Always fails as an unreachable provider would.
pub struct DownEmbedder;

impl Embedder for DownEmbedder {
    fn embedder_id(&self) -> &str { "down" }
    fn dim(&self) -> usize { DIM }
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::ProviderUnavailable("connection refused".into()))
    }
}

/// Returns vectors one component too wide.
pub struct WideEmbedder;

impl Embedder for WideEmbedder {
    fn embedder_id(&self) -> &str { "wide" }
    fn dim(&self) -> usize { DIM }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0; DIM + 1]).collect())
    }
}

pub fn doc(title: &str, content: &str, file_path: &str) -> DocumentRecord {
    DocumentRecord {
        title: title.into(),
        content: content.into(),
        paragraphs: content.split("\n\n").map(str::to_string).collect(),
        format_source: "TXT".into(),
        file_path: file_path.into(),
        structured_info: Default::default(),
    }
}
