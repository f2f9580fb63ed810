//! Cache-fronted question answering over the hybrid engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use litdb_cache::AnswerCache;
use litdb_core::types::{ContentFilter, DocId, SearchResult};
use litdb_core::Result;

use crate::engine::HybridRetrievalEngine;

/// A source the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSource {
    pub doc_id: DocId,
    pub score: f32,
    pub title: String,
    pub format_source: String,
    pub file_path: String,
}

impl From<&SearchResult> for CitedSource {
    fn from(hit: &SearchResult) -> Self {
        Self {
            doc_id: hit.doc_id,
            score: hit.score,
            title: hit.document.title.clone(),
            format_source: hit.document.format_source.clone(),
            file_path: hit.document.file_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub analysis: String,
    pub answer: String,
    pub sources: Vec<CitedSource>,
}

/// Ranked sources for one query, and whether they came from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CitedSearch {
    pub sources: Vec<CitedSource>,
    pub from_cache: bool,
}

/// Cache filter payload for [`cited_search`]; the hit list depends on `top_k`.
pub fn cited_search_filters(filter: ContentFilter, top_k: usize) -> Value {
    json!({ "filter": filter, "top_k": top_k })
}

/// Search and cite, fronted by `cache`.
///
/// Empty hit lists are never stored, and a stored empty list counts as a miss,
/// so documents indexed later become visible immediately.
pub fn cited_search(
    engine: &HybridRetrievalEngine,
    cache: &AnswerCache,
    query: &str,
    top_k: usize,
    filter: ContentFilter,
    use_cache: bool,
) -> Result<CitedSearch> {
    let filters = cited_search_filters(filter, top_k);
    if use_cache {
        if let Some(sources) = cache.get::<Vec<CitedSource>, _>(query, &filters) {
            if !sources.is_empty() {
                debug!(query, "sources served from cache");
                return Ok(CitedSearch { sources, from_cache: true });
            }
        }
    }

    let hits = engine.search(query, top_k, filter)?;
    let sources: Vec<CitedSource> = hits.iter().map(CitedSource::from).collect();
    if use_cache && !sources.is_empty() {
        cache.set(query, &sources, &filters);
    }
    Ok(CitedSearch { sources, from_cache: false })
}

/// External component that turns ranked passages into a grounded answer.
pub trait Reasoner: Send + Sync {
    fn answer(&self, question: &str, results: &[SearchResult]) -> Result<Answer>;
}

pub struct AnswerPipeline {
    engine: Arc<HybridRetrievalEngine>,
    cache: AnswerCache,
    reasoner: Arc<dyn Reasoner>,
    top_k: usize,
}

impl AnswerPipeline {
    pub fn new(engine: Arc<HybridRetrievalEngine>, cache: AnswerCache, reasoner: Arc<dyn Reasoner>, top_k: usize) -> Self {
        Self { engine, cache, reasoner, top_k }
    }

    pub fn engine(&self) -> &HybridRetrievalEngine { &self.engine }

    pub fn cache(&self) -> &AnswerCache { &self.cache }

    /// Answer `question`, or `Ok(None)` when retrieval finds nothing to ground on.
    pub fn ask(&self, question: &str, filter: ContentFilter, use_cache: bool) -> Result<Option<Answer>> {
        let filters = json!({ "filter": filter });
        if use_cache {
            if let Some(hit) = self.cache.get::<Answer, _>(question, &filters) {
                debug!(question, "answer served from cache");
                return Ok(Some(hit));
            }
        }

        let results = self.engine.search(question, self.top_k, filter)?;
        if results.is_empty() {
            info!(question, %filter, "no documents matched");
            return Ok(None);
        }
        let answer = self.reasoner.answer(question, &results)?;
        if use_cache {
            self.cache.set(question, &answer, &filters);
        }
        Ok(Some(answer))
    }
}
