//! docqa-pipeline
//!
//! Query-time answering over a document index: optional query enhancement,
//! hybrid retrieval with Reciprocal Rank Fusion, relevance reranking and
//! citation-grounded answer generation, sequenced by [`QueryOrchestrator`].

pub mod enhance;
pub mod llm;
pub mod orchestrator;
pub mod rerank;
pub mod synthesis;

pub use orchestrator::{Collaborators, QueryFailure, QueryOptions, QueryOrchestrator, Stage};
