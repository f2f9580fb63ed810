mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use litdb_cache::AnswerCache;
use litdb_core::types::{ContentFilter, SearchResult};
use litdb_core::Result;
use litdb_hybrid::{cited_search, cited_search_filters, Answer, AnswerPipeline, CitedSource, HybridRetrievalEngine, Reasoner};
use tempfile::tempdir;

use common::{doc, TableEmbedder};

#[derive(Default)]
struct EchoReasoner {
    calls: AtomicUsize,
}

impl Reasoner for EchoReasoner {
    fn answer(&self, question: &str, results: &[SearchResult]) -> Result<Answer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Answer {
            analysis: format!("{} passages considered", results.len()),
            answer: format!("about {question}"),
            sources: results.iter().map(CitedSource::from).collect(),
        })
    }
}

fn engine(dir: &std::path::Path) -> Arc<HybridRetrievalEngine> {
    let engine = HybridRetrievalEngine::new(TableEmbedder::new(&[]), dir.join("index"));
    engine
        .build_index(vec![
            doc("irrigation", "drip irrigation saves water", "irrigation.pdf"),
            doc("yields", "【表格】| crop | yield | irrigation", "yields.xlsx"),
        ])
        .unwrap();
    Arc::new(engine)
}

#[test]
fn second_ask_is_served_from_cache() {
    let dir = tempdir().unwrap();
    let reasoner = Arc::new(EchoReasoner::default());
    let cache = AnswerCache::open(dir.path().join("cache"), true).unwrap();
    let pipeline = AnswerPipeline::new(engine(dir.path()), cache, reasoner.clone(), 5);

    let first = pipeline.ask("irrigation", ContentFilter::None, true).unwrap().expect("answer");
    let second = pipeline.ask("irrigation", ContentFilter::None, true).unwrap().expect("answer");
    assert_eq!(first, second);
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.sources.len(), 2);
    assert_eq!(first.sources[0].file_path, "irrigation.pdf");

    // A different filter is a different cache key
    let tables = pipeline.ask("irrigation", ContentFilter::Table, true).unwrap().expect("answer");
    assert_eq!(tables.sources.len(), 1);
    assert_eq!(tables.sources[0].title, "yields");
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn disabled_or_bypassed_cache_always_reasons() {
    let dir = tempdir().unwrap();
    let reasoner = Arc::new(EchoReasoner::default());
    let engine = engine(dir.path());

    let pipeline = AnswerPipeline::new(Arc::clone(&engine), AnswerCache::disabled(), reasoner.clone(), 5);
    pipeline.ask("irrigation", ContentFilter::None, true).unwrap();
    pipeline.ask("irrigation", ContentFilter::None, true).unwrap();
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 2);

    let cache = AnswerCache::open(dir.path().join("cache"), true).unwrap();
    let pipeline = AnswerPipeline::new(engine, cache, reasoner.clone(), 5);
    pipeline.ask("irrigation", ContentFilter::None, false).unwrap();
    pipeline.ask("irrigation", ContentFilter::None, false).unwrap();
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 4);
    assert!(pipeline.cache().get::<Answer, _>("irrigation", &serde_json::json!({ "filter": "none" })).is_none());
}

#[test]
fn no_matches_skips_the_reasoner() {
    let dir = tempdir().unwrap();
    let reasoner = Arc::new(EchoReasoner::default());
    let cache = AnswerCache::open(dir.path().join("cache"), true).unwrap();
    let pipeline = AnswerPipeline::new(engine(dir.path()), cache, reasoner.clone(), 5);

    assert!(pipeline.ask("irrigation", ContentFilter::Formula, true).unwrap().is_none());
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 0);
}

fn cache_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.filter_map(|e| e.ok()).count()).unwrap_or(0)
}

#[test]
fn cited_search_caches_non_empty_hits() {
    let dir = tempdir().unwrap();
    let engine = engine(dir.path());
    let cache = AnswerCache::open(dir.path().join("cache"), true).unwrap();

    let first = cited_search(&engine, &cache, "irrigation", 5, ContentFilter::None, true).unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.sources.len(), 2);

    let second = cited_search(&engine, &cache, "irrigation", 5, ContentFilter::None, true).unwrap();
    assert!(second.from_cache);
    assert_eq!(second.sources, first.sources);
}

#[test]
fn empty_hit_lists_are_neither_stored_nor_served() {
    let dir = tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let engine = engine(dir.path());
    let cache = AnswerCache::open(&cache_dir, true).unwrap();

    let miss = cited_search(&engine, &cache, "irrigation", 5, ContentFilter::Formula, true).unwrap();
    assert!(miss.sources.is_empty());
    assert_eq!(cache_files(&cache_dir), 0, "no entry written for an empty result");

    // An empty list left by an older writer is ignored too
    cache.set("irrigation", &Vec::<CitedSource>::new(), &cited_search_filters(ContentFilter::Formula, 5));
    engine
        .build_index(vec![
            doc("irrigation", "drip irrigation saves water", "irrigation.pdf"),
            doc("model", "【公式】$q = k i$ irrigation", "model.tex"),
        ])
        .unwrap();

    let found = cited_search(&engine, &cache, "irrigation", 5, ContentFilter::Formula, true).unwrap();
    assert!(!found.from_cache);
    assert_eq!(found.sources.len(), 1);
    assert_eq!(found.sources[0].file_path, "model.tex");
}
