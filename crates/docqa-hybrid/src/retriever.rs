use std::sync::Arc;

use tracing::{debug, warn};

use docqa_core::fusion::fuse;
use docqa_core::policy::{CallPolicy, Operation};
use docqa_core::traits::{Embedder, IndexBackend};
use docqa_core::types::{Degradation, FusedCandidate, RankedCandidate};
use docqa_core::{Error, Result};

/// Fused candidates for one query string.
#[derive(Debug, Clone)]
pub struct Retrieval {
	pub candidates: Vec<FusedCandidate>,
	/// Set when only one of the two searches contributed.
	pub degradation: Option<Degradation>,
}

/// Keyword + vector search for one query, merged with Reciprocal Rank Fusion.
pub struct HybridRetriever {
	backend: Arc<dyn IndexBackend>,
	embedder: Arc<dyn Embedder>,
	policy: CallPolicy,
	rrf_k: u32,
}

impl HybridRetriever {
	pub fn new(backend: Arc<dyn IndexBackend>, embedder: Arc<dyn Embedder>, policy: CallPolicy, rrf_k: u32) -> Self {
		Self { backend, embedder, policy, rrf_k }
	}

	async fn keyword(&self, query: &str, top_k: usize) -> Result<Vec<RankedCandidate>> {
		self.policy.run(Operation::KeywordSearch, || self.backend.search_keyword(query, top_k)).await
	}

	async fn vector(&self, query: &str, top_k: usize) -> Result<Vec<RankedCandidate>> {
		let vector = self.policy.run(Operation::Embed, || self.embedder.embed(query)).await?;
		let expected = self.backend.dimension();
		if vector.len() != expected { return Err(Error::DimensionMismatch { expected, actual: vector.len() }); }
		self.policy.run(Operation::VectorSearch, || self.backend.search_vector(&vector, top_k)).await
	}

	/// Run both searches concurrently for `top_k` each and fuse them.
	///
	/// If exactly one side fails, its partner's list is returned on its own
	/// with a degradation marker. Fails only when both sides fail.
	pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval> {
		let (keyword, vector) = tokio::join!(self.keyword(query, top_k), self.vector(query, top_k));
		let (lists, degradation) = match (keyword, vector) {
			(Ok(kw), Ok(vec)) => (vec![kw, vec], None),
			(Ok(kw), Err(e)) => {
				warn!(query, error = %e, "vector side failed; keyword-only retrieval");
				(vec![kw], Some(Degradation::KeywordOnly { query: query.to_string() }))
			}
			(Err(e), Ok(vec)) => {
				warn!(query, error = %e, "keyword search failed; vector-only retrieval");
				(vec![vec], Some(Degradation::VectorOnly { query: query.to_string() }))
			}
			(Err(kw_err), Err(vec_err)) => {
				return Err(Error::BackendUnavailable(format!("keyword: {kw_err}; vector: {vec_err}")));
			}
		};
		let mut candidates = fuse(&lists, self.rrf_k);
		candidates.truncate(top_k);
		debug!(query, candidates = candidates.len(), degraded = degradation.is_some(), "retrieved");
		Ok(Retrieval { candidates, degradation })
	}
}
