use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use docqa_core::traits::IndexBackend;
use docqa_core::types::{Chunk, RankedCandidate};
use docqa_core::Result;
use docqa_text::KeywordIndex;
use docqa_vector::VectorIndex;

/// In-process index backend: tantivy keyword index plus a cosine vector index
/// over the same chunks.
pub struct LocalIndex {
	text: KeywordIndex,
	vector: VectorIndex,
}

impl LocalIndex {
	pub fn new(dim: usize) -> Result<Self> { Ok(Self { text: KeywordIndex::new()?, vector: VectorIndex::new(dim) }) }

	/// Build an index from chunks that already carry embeddings.
	pub fn from_chunks(dim: usize, chunks: Vec<Chunk>) -> Result<Self> {
		let mut index = Self::new(dim)?;
		index.index(chunks)?;
		Ok(index)
	}

	/// Index chunks into both halves. Vectors are checked first so a
	/// dimension mismatch leaves the index untouched.
	pub fn index(&mut self, chunks: Vec<Chunk>) -> Result<()> {
		let chunks: Vec<Arc<Chunk>> = chunks.into_iter().map(Arc::new).collect();
		let with_vectors = self.vector.insert(&chunks)?;
		self.text.index(&chunks)?;
		info!(chunks = chunks.len(), with_vectors, total = self.text.len(), "local index updated");
		Ok(())
	}

	pub fn len(&self) -> usize { self.text.len() }

	pub fn is_empty(&self) -> bool { self.text.is_empty() }
}

#[async_trait]
impl IndexBackend for LocalIndex {
	fn dimension(&self) -> usize { self.vector.dim() }

	async fn search_keyword(&self, text: &str, top_k: usize) -> Result<Vec<RankedCandidate>> { self.text.search(text, top_k) }

	async fn search_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<RankedCandidate>> { self.vector.search(vector, top_k) }
}
