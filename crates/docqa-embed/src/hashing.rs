use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use docqa_core::traits::Embedder;
use docqa_core::Result;

/// Deterministic bag-of-words embedder.
///
/// Each lowercased token is hashed into one of `dim` buckets; the result is
/// L2-normalised. Texts sharing words land close together, which is enough
/// for offline use and tests without a model server.
pub struct HashingEmbedder {
	id: String,
	dim: usize,
}

impl HashingEmbedder {
	pub fn new(dim: usize) -> Self { Self { id: format!("hashing:d{dim}"), dim } }

	#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
	pub fn embed_sync(&self, text: &str) -> Vec<f32> {
		let mut v = vec![0f32; self.dim];
		if self.dim == 0 { return v; }
		for (i, token) in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).enumerate() {
			let mut hasher = XxHash64::with_seed(0);
			token.to_lowercase().hash(&mut hasher);
			let h = hasher.finish();
			let idx = (h as usize) % self.dim;
			let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
			v[idx] += 0.5 + val + (i % 3) as f32 * 0.01;
		}
		let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
		for x in &mut v { *x /= norm; }
		v
	}
}

#[async_trait]
impl Embedder for HashingEmbedder {
	fn embedder_id(&self) -> &str { &self.id }

	fn dim(&self) -> usize { self.dim }

	async fn embed(&self, text: &str) -> Result<Vec<f32>> { Ok(self.embed_sync(text)) }
}
