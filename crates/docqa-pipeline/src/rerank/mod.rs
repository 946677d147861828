//! Relevance reranking of fused candidates.

mod scorer;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use docqa_core::policy::{CallPolicy, Operation};
use docqa_core::traits::RelevanceScorer;
use docqa_core::types::FusedCandidate;
use docqa_core::{Error, Result};

pub use scorer::{RemoteScorer, ScoringProvider, TermOverlapScorer};

pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
    policy: CallPolicy,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, policy: CallPolicy) -> Self {
        Self { scorer, policy }
    }

    /// Score every candidate concurrently, order by score (ties keep fused
    /// order) and keep `top_n`.
    ///
    /// Candidates whose scoring failed, or came back NaN or infinite, follow the
    /// scored ones in fused order.
    /// Only `rerank_score` is written; fails with `ScoringUnavailable` when no
    /// candidate could be scored.
    pub async fn rerank(&self, query: &str, candidates: Vec<FusedCandidate>, top_n: usize) -> Result<Vec<FusedCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let scores = join_all(candidates.iter().map(|c| {
            let text = c.chunk.text.as_str();
            self.policy.run(Operation::Score, move || self.scorer.score(query, text))
        }))
        .await;

        let mut scored = Vec::with_capacity(candidates.len());
        let mut unscored = Vec::new();
        let mut last_error = None;
        for (mut candidate, score) in candidates.into_iter().zip(scores) {
            match score {
                Ok(s) if s.is_finite() => {
                    candidate.rerank_score = Some(s);
                    scored.push(candidate);
                }
                Ok(s) => {
                    warn!(chunk = %candidate.chunk.id, score = %s, "scorer returned a non-finite score");
                    last_error = Some(Error::ScoringUnavailable(format!("non-finite score {s}")));
                    unscored.push(candidate);
                }
                Err(e) => {
                    warn!(chunk = %candidate.chunk.id, error = %e, "candidate could not be scored");
                    last_error = Some(e);
                    unscored.push(candidate);
                }
            }
        }
        if scored.is_empty() {
            let reason = last_error.map_or_else(|| "no scores".to_string(), |e| e.to_string());
            return Err(Error::ScoringUnavailable(reason));
        }

        scored.sort_by(|a, b| {
            let (a, b) = (a.rerank_score.unwrap_or(f32::MIN), b.rerank_score.unwrap_or(f32::MIN));
            b.total_cmp(&a)
        });
        debug!(scored = scored.len(), unscored = unscored.len(), top_n, scorer = self.scorer.scorer_id(), "reranked");
        scored.extend(unscored);
        scored.truncate(top_n);
        Ok(scored)
    }
}
