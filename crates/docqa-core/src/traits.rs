//! Capability interfaces for the external collaborators of the pipeline.
//!
//! Every method is a suspension point; callers wrap them in a
//! [`CallPolicy`](crate::policy::CallPolicy) for timeouts and retries.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Prompt, RankedCandidate};

/// Read-only search surface of a document index.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Dimension of every vector stored in the index.
    fn dimension(&self) -> usize;
    async fn search_keyword(&self, text: &str, top_k: usize) -> Result<Vec<RankedCandidate>>;
    async fn search_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<RankedCandidate>>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hashing:d1024`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Query/passage relevance; higher is more relevant.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    fn scorer_id(&self) -> &str;
    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}
