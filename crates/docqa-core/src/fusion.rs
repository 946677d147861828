//! Reciprocal Rank Fusion: `score = Σ 1/(k + rank_i)`.
//!
//! Merges ranked lists from different retrieval strategies (keyword vs
//! vector, or one list per query variant) without normalising their
//! native scores. Chunks are deduplicated by id; ties keep the order in
//! which chunks were first encountered across the input lists.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Chunk, FusedCandidate, RankedCandidate};

pub const DEFAULT_RRF_K: u32 = 60;

/// Contribution of a single list entry.
pub fn rrf_term(k: u32, rank: usize) -> f64 {
    1.0 / (f64::from(k) + rank as f64)
}

/// Fuse ranked lists into one list ordered by descending fusion score.
///
/// `k` is the smoothing constant; a larger `k` flattens the effect of rank
/// differences. A `k` of zero is treated as one.
pub fn fuse(lists: &[Vec<RankedCandidate>], k: u32) -> Vec<FusedCandidate> {
    let k = k.max(1);
    let mut first_seen: Vec<&Arc<Chunk>> = Vec::new();
    let mut scores: HashMap<&str, (usize, f64)> = HashMap::new();

    for list in lists {
        for candidate in list {
            let term = rrf_term(k, candidate.rank);
            match scores.get_mut(candidate.chunk.id.as_str()) {
                Some((_, score)) => *score += term,
                None => {
                    scores.insert(candidate.chunk.id.as_str(), (first_seen.len(), term));
                    first_seen.push(&candidate.chunk);
                }
            }
        }
    }

    let mut ordered: Vec<(usize, f64)> = scores.into_values().collect();
    ordered.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(pos, (seen, fusion_score))| FusedCandidate {
            chunk: Arc::clone(first_seen[seen]),
            fusion_score,
            rank: pos + 1,
            rerank_score: None,
        })
        .collect()
}
