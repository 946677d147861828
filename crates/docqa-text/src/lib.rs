//! docqa-text
//!
//! Tantivy-based keyword index used as the lexical half of the local index
//! backend. Chunks live in RAM; search combines exact BM25 term matches with
//! fuzzy matches so small typos in a question still reach the right chunk.

pub mod tantivy_utils;
pub mod index;

pub use index::KeywordIndex;
