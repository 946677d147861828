//! docqa-vector
//!
//! Brute-force in-memory vector index. Each chunk carries its own embedding;
//! search scores every stored vector by cosine similarity against the query.

pub mod similarity;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use docqa_core::types::{Chunk, ChunkId, RankedCandidate};
use docqa_core::{Error, Result};

pub struct VectorIndex {
	dim: usize,
	entries: Vec<Arc<Chunk>>,
	positions: HashMap<ChunkId, usize>,
}

impl VectorIndex {
	pub fn new(dim: usize) -> Self { Self { dim, entries: Vec::new(), positions: HashMap::new() } }

	pub fn dim(&self) -> usize { self.dim }

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	/// Store chunks with embeddings. Chunks with an empty vector are skipped; a
	/// vector of the wrong dimension rejects the whole batch.
	pub fn insert(&mut self, chunks: &[Arc<Chunk>]) -> Result<usize> {
		for c in chunks.iter().filter(|c| !c.vector.is_empty()) {
			if c.vector.len() != self.dim { return Err(Error::DimensionMismatch { expected: self.dim, actual: c.vector.len() }); }
		}
		let mut added = 0usize;
		for c in chunks.iter().filter(|c| !c.vector.is_empty()) {
			match self.positions.get(&c.id) {
				Some(&pos) => self.entries[pos] = Arc::clone(c),
				None => {
					self.positions.insert(c.id.clone(), self.entries.len());
					self.entries.push(Arc::clone(c));
				}
			}
			added += 1;
		}
		debug!(added, total = self.entries.len(), "vector index updated");
		Ok(added)
	}

	/// Top-k chunks by cosine similarity; equal scores order by chunk id.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedCandidate>> {
		if query.len() != self.dim { return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() }); }
		let mut scored: Vec<(f32, &Arc<Chunk>)> = self.entries.iter()
			.map(|c| (similarity::cosine(query, &c.vector), c))
			.collect();
		scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then_with(|| a.1.id.cmp(&b.1.id)));
		scored.truncate(k);
		Ok(RankedCandidate::rank_list(scored.into_iter().map(|(s, c)| (Arc::clone(c), Some(s)))))
	}
}
