//! Query rewriting strategies backed by the language model.
//!
//! Strategies return `Err` only when the model is unreachable; unusable model
//! output falls back to the original query inside the strategy.

mod coreference;
mod decompose;
mod multi_query;

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use docqa_core::types::{EnhancedQuery, Turn};
use docqa_core::Result;

pub use coreference::CoreferenceResolver;
pub use decompose::QueryDecomposer;
pub use multi_query::MultiQueryExpander;

#[async_trait]
pub trait EnhancementStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn enhance(&self, query: &str, history: &[Turn]) -> Result<EnhancedQuery>;
}

/// First `{ ... }` object in `text`, tolerating prose or code fences around it.
pub(crate) fn parse_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end]).ok().filter(Value::is_object)
}

/// String entries of `value[key]`, trimmed, non-empty.
pub(crate) fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Drop case-insensitive duplicates (and anything equal to `exclude`), keeping first occurrences.
pub(crate) fn dedup_case_insensitive(items: Vec<String>, exclude: Option<&str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    if let Some(q) = exclude {
        seen.insert(q.trim().to_lowercase());
    }
    items.into_iter().filter(|s| seen.insert(s.to_lowercase())).collect()
}
