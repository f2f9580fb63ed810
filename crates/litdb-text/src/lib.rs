//! litdb-text
//!
//! Tantivy-backed lexical scoring. The index lives in RAM and is rebuilt from
//! document texts whenever a snapshot is built or loaded, so it never drifts
//! from the persisted vector half.
pub mod index;
pub mod tokenizer;

pub use index::LexicalIndex;
pub use tokenizer::tokenize;
