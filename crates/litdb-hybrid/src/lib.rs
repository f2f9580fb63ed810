//! Hybrid retrieval: BM25 and inner-product signals fused into one ranking,
//! persisted as generation-swapped snapshots.

pub mod answer;
pub mod engine;
pub mod fusion;
pub mod snapshot;
pub mod store;

pub use answer::{cited_search, cited_search_filters, Answer, AnswerPipeline, CitedSearch, CitedSource, Reasoner};
pub use engine::{EngineOptions, HybridRetrievalEngine};
pub use snapshot::Snapshot;
pub use store::SnapshotStore;
