use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use litdb_core::traits::Embedder;
use litdb_core::types::{ContentFilter, DocId, DocumentRecord, SearchResult};
use litdb_core::{Error, Result};
use litdb_text::{tokenize, LexicalIndex};
use litdb_vector::FlatIpIndex;

use crate::fusion::{fuse, top_candidates, CANDIDATE_MULTIPLIER};
use crate::snapshot::{index_mapping, Snapshot};
use crate::store::SnapshotStore;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Candidate pool per signal is `candidate_multiplier * top_k`.
    pub candidate_multiplier: usize,
    /// Texts per embedding call during a build.
    pub embed_batch_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { candidate_multiplier: CANDIDATE_MULTIPLIER, embed_batch_size: 64 }
    }
}

/// Hybrid lexical + vector retrieval over one persisted snapshot.
///
/// Builds are serialized by `build_lock` and publish a new [`Snapshot`]
/// by swapping the shared reference. Queries clone that reference up front
/// and never observe a half-built index.
pub struct HybridRetrievalEngine {
    embedder: Arc<dyn Embedder>,
    store: SnapshotStore,
    options: EngineOptions,
    current: RwLock<Option<Arc<Snapshot>>>,
    build_lock: Mutex<()>,
}

impl HybridRetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>, index_dir: impl Into<PathBuf>) -> Self {
        Self::with_options(embedder, index_dir, EngineOptions::default())
    }

    pub fn with_options(embedder: Arc<dyn Embedder>, index_dir: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            embedder,
            store: SnapshotStore::new(index_dir),
            options,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &EngineOptions { &self.options }

    pub fn store(&self) -> &SnapshotStore { &self.store }

    /// The snapshot currently in memory, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = self.options.embed_batch_size.max(1);
        let dim = self.embedder.dim();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch) {
            let vectors = self.embedder.embed_batch(chunk)?;
            if vectors.len() != chunk.len() {
                return Err(Error::ProviderUnavailable(format!(
                    "embedder returned {} vectors for {} texts", vectors.len(), chunk.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
            }
            out.extend(vectors);
            debug!(done = out.len(), total = texts.len(), "embedded batch");
        }
        Ok(out)
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProviderUnavailable("embedder returned no vector for the query".into()))
    }

    /// Embed, index and persist `documents`, then make them the live snapshot.
    ///
    /// Any failure leaves the previous snapshot, in memory and on disk, untouched.
    pub fn build_index(&self, documents: Vec<DocumentRecord>) -> Result<Arc<Snapshot>> {
        let _guard = self.build_lock.lock();
        if documents.is_empty() { return Err(Error::EmptyCorpus); }
        let mapping = index_mapping(&documents)?;

        let texts: Vec<String> = documents.iter().map(DocumentRecord::embedding_text).collect();
        info!(docs = documents.len(), embedder = self.embedder.embedder_id(), "building index");
        let embeddings = self.embed_all(&texts)?;
        let vectors = FlatIpIndex::build(&embeddings)?;
        let lexical = LexicalIndex::build(&texts)?;

        let generation = self.store.persist(&documents, &mapping, &vectors)?;
        let snapshot = Arc::new(Snapshot::new(generation, documents, mapping, vectors, lexical));
        *self.current.write() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn load_locked(&self) -> Result<Option<Arc<Snapshot>>> {
        let Some(snapshot) = self.store.load()? else { return Ok(None) };
        if snapshot.vectors().dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: snapshot.vectors().dim() });
        }
        info!(generation = snapshot.generation(), docs = snapshot.len(), "snapshot loaded");
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(Arc::clone(&snapshot));
        Ok(Some(snapshot))
    }

    /// Load the persisted snapshot, surfacing why it could not be used.
    pub fn try_load_index(&self) -> Result<bool> {
        let _guard = self.build_lock.lock();
        Ok(self.load_locked()?.is_some())
    }

    /// Load the persisted snapshot; `false` when there is none or it is unusable.
    pub fn load_index(&self) -> bool {
        match self.try_load_index() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "persisted index unusable; rebuild required");
                false
            }
        }
    }

    fn acquire(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.snapshot() { return Ok(snapshot); }
        let _guard = self.build_lock.lock();
        if let Some(snapshot) = self.snapshot() { return Ok(snapshot); }
        match self.load_locked() {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(Error::IndexNotBuilt),
            Err(e) => {
                warn!(error = %e, "persisted index unusable");
                Err(Error::IndexNotBuilt)
            }
        }
    }

    /// Ranked hybrid search. May return fewer than `top_k` hits when `filter` is restrictive.
    pub fn search(&self, query: &str, top_k: usize, filter: ContentFilter) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be positive".into()));
        }
        let snapshot = self.acquire()?;
        let pool = top_k.saturating_mul(self.options.candidate_multiplier.max(1));
        let tokens = tokenize(query);

        let (lexical_scores, query_vector) = thread::scope(|s| -> Result<(Vec<f32>, Vec<f32>)> {
            let lexical = s.spawn(|| snapshot.lexical().score(&tokens));
            let query_vector = self.embed_query(query);
            let lexical_scores = lexical
                .join()
                .map_err(|_| Error::Lexical("lexical scoring thread panicked".into()))??;
            Ok((lexical_scores, query_vector?))
        })?;

        let lexical_hits = top_candidates(&lexical_scores, pool);
        let vector_hits = snapshot.vectors().search(&query_vector, pool)?;
        let fused = fuse(&lexical_hits, &vector_hits);
        debug!(query, lexical = lexical_hits.len(), vector = vector_hits.len(), fused = fused.len(), "fused candidates");

        let results: Vec<SearchResult> = fused
            .into_iter()
            .take(pool)
            .filter_map(|(doc_id, score)| {
                let document = snapshot.document(doc_id)?;
                filter.matches(document).then(|| SearchResult { doc_id, score, document: document.clone() })
            })
            .take(top_k)
            .collect();
        Ok(results)
    }

    /// Resolve a document by its `file_path` in the live snapshot.
    pub fn lookup(&self, file_path: &str) -> Option<(DocId, DocumentRecord)> {
        let snapshot = self.snapshot()?;
        snapshot.lookup(file_path).map(|(id, doc)| (id, doc.clone()))
    }
}
