use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use docqa_core::policy::{CallPolicy, Operation};
use docqa_core::traits::LanguageModel;
use docqa_core::types::{EnhancedQuery, Prompt, Turn};
use docqa_core::Result;

use super::{dedup_case_insensitive, parse_json_object, string_list, EnhancementStrategy};

const SYSTEM: &str = "You decide whether a question asks about several independent things. \
If it does, split it into self-contained sub-questions that can each be answered on their own. \
If it asks about a single thing, do not split it. \
Respond with a JSON object: {\"compound\": true|false, \"queries\": [\"...\"]}.";

/// Splits compound questions into independently answerable sub-questions.
pub struct QueryDecomposer {
    lm: Arc<dyn LanguageModel>,
    policy: CallPolicy,
}

impl QueryDecomposer {
    pub fn new(lm: Arc<dyn LanguageModel>, policy: CallPolicy) -> Self {
        Self { lm, policy }
    }
}

#[async_trait]
impl EnhancementStrategy for QueryDecomposer {
    fn name(&self) -> &'static str {
        "decomposition"
    }

    /// Always `SubQueries`; a single element equal to `query` unless the
    /// model explicitly marks the question compound with two or more parts.
    async fn enhance(&self, query: &str, _history: &[Turn]) -> Result<EnhancedQuery> {
        let prompt = Prompt::new(SYSTEM, format!("Question: {query}")).json().with_temperature(0.0);
        let raw = self.policy.run(Operation::Generate, || self.lm.complete(&prompt)).await?;
        let not_compound = || EnhancedQuery::SubQueries(vec![query.to_string()]);
        let Some(value) = parse_json_object(&raw) else {
            warn!(raw = %raw, "unusable decomposition; treating question as simple");
            return Ok(not_compound());
        };
        if value.get("compound").and_then(Value::as_bool) != Some(true) {
            return Ok(not_compound());
        }
        let parts = dedup_case_insensitive(string_list(&value, "queries"), None);
        if parts.len() < 2 {
            return Ok(not_compound());
        }
        debug!(parts = parts.len(), "question decomposed");
        Ok(EnhancedQuery::SubQueries(parts))
    }
}
