//! docqa-embed
//!
//! Query embedding providers. The provider is picked once from configuration:
//! a local hashing embedder that needs no model files, or a remote
//! OpenAI-compatible embeddings endpoint.

pub mod hashing;
pub mod remote;

use async_trait::async_trait;
use tracing::info;

use docqa_core::config::{EmbeddingConfig, EmbeddingProviderKind};
use docqa_core::traits::Embedder;
use docqa_core::Result;

pub use hashing::HashingEmbedder;
pub use remote::RemoteEmbedder;

pub enum EmbeddingProvider {
	Local(HashingEmbedder),
	Remote(RemoteEmbedder),
}

impl EmbeddingProvider {
	/// `APP_USE_FAKE_EMBEDDINGS=1` forces the local embedder regardless of config.
	pub fn from_config(config: &EmbeddingConfig) -> Self {
		let force_local = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
		match config.provider {
			EmbeddingProviderKind::Remote if !force_local => {
				info!(model = %config.model, base_url = %config.base_url, "using remote embeddings");
				Self::Remote(RemoteEmbedder::new(config))
			}
			_ => {
				info!(dim = config.dim, "using hashing embeddings");
				Self::Local(HashingEmbedder::new(config.dim))
			}
		}
	}

	fn inner(&self) -> &dyn Embedder {
		match self {
			Self::Local(e) => e,
			Self::Remote(e) => e,
		}
	}
}

#[async_trait]
impl Embedder for EmbeddingProvider {
	fn embedder_id(&self) -> &str { self.inner().embedder_id() }

	fn dim(&self) -> usize { self.inner().dim() }

	async fn embed(&self, text: &str) -> Result<Vec<f32>> { self.inner().embed(text).await }
}
