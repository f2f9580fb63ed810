//! Late fusion of the lexical and vector candidate lists.

use std::collections::BTreeMap;

use litdb_core::types::DocId;

pub const LEXICAL_WEIGHT: f32 = 0.3;
pub const VECTOR_WEIGHT: f32 = 0.7;
/// Each signal contributes this many candidates per requested result.
pub const CANDIDATE_MULTIPLIER: usize = 2;

fn rank(hits: &mut [(DocId, f32)]) {
    hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
}

/// The `k` best `(doc_id, score)` pairs of a dense score vector.
pub fn top_candidates(scores: &[f32], k: usize) -> Vec<(DocId, f32)> {
    let mut hits: Vec<(DocId, f32)> = scores.iter().copied().enumerate().collect();
    rank(&mut hits);
    hits.truncate(k);
    hits
}

/// Weighted sum over the union of both candidate sets, best first.
///
/// A document present in only one list contributes only that term.
pub fn fuse(lexical: &[(DocId, f32)], vector: &[(DocId, f32)]) -> Vec<(DocId, f32)> {
    let mut fused: BTreeMap<DocId, f32> = BTreeMap::new();
    for &(id, score) in lexical {
        *fused.entry(id).or_insert(0.0) += LEXICAL_WEIGHT * score;
    }
    for &(id, score) in vector {
        *fused.entry(id).or_insert(0.0) += VECTOR_WEIGHT * score;
    }
    let mut out: Vec<(DocId, f32)> = fused.into_iter().collect();
    rank(&mut out);
    out
}
