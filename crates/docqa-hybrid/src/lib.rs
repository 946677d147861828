//! docqa-hybrid
//!
//! Hybrid retrieval over an [`IndexBackend`](docqa_core::traits::IndexBackend):
//! keyword and vector search run concurrently and are merged with Reciprocal
//! Rank Fusion. [`LocalIndex`] is the in-process backend built from the
//! tantivy keyword index and the in-memory vector index.

pub mod local;
pub mod retriever;

pub use local::LocalIndex;
pub use retriever::{HybridRetriever, Retrieval};
