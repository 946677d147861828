use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use docqa_core::policy::{CallPolicy, Operation};
use docqa_core::traits::LanguageModel;
use docqa_core::types::{EnhancedQuery, Prompt, Turn};
use docqa_core::Result;

use super::{parse_json_object, EnhancementStrategy};

const SYSTEM: &str = "You rewrite follow-up questions so they can be understood without the conversation. \
Replace pronouns and vague references with the entities they refer to in the conversation. \
If the question is already self-contained, return it unchanged. \
Respond with a JSON object: {\"query\": \"<rewritten question>\"}.";

/// Only the most recent turns are shown to the model.
const MAX_TURNS: usize = 6;

/// Rewrites a follow-up question into a self-contained one using prior turns.
pub struct CoreferenceResolver {
    lm: Arc<dyn LanguageModel>,
    policy: CallPolicy,
}

impl CoreferenceResolver {
    pub fn new(lm: Arc<dyn LanguageModel>, policy: CallPolicy) -> Self {
        Self { lm, policy }
    }

    fn prompt(query: &str, history: &[Turn]) -> Prompt {
        let mut user = String::from("Conversation:\n");
        let start = history.len().saturating_sub(MAX_TURNS);
        for turn in &history[start..] {
            let _ = writeln!(user, "{}: {}", turn.role, turn.text);
        }
        let _ = write!(user, "\nFollow-up question: {query}");
        Prompt::new(SYSTEM, user).json().with_temperature(0.0)
    }
}

#[async_trait]
impl EnhancementStrategy for CoreferenceResolver {
    fn name(&self) -> &'static str {
        "coreference"
    }

    async fn enhance(&self, query: &str, history: &[Turn]) -> Result<EnhancedQuery> {
        if history.is_empty() {
            return Ok(EnhancedQuery::Rewritten(query.to_string()));
        }
        let prompt = Self::prompt(query, history);
        let raw = self.policy.run(Operation::Generate, || self.lm.complete(&prompt)).await?;
        let rewritten = parse_json_object(&raw)
            .and_then(|v| v.get("query").and_then(|q| q.as_str()).map(str::trim).map(str::to_string))
            .filter(|q| !q.is_empty());
        match rewritten {
            Some(q) => {
                debug!(original = query, rewritten = %q, "coreferences resolved");
                Ok(EnhancedQuery::Rewritten(q))
            }
            None => {
                warn!(raw = %raw, "unusable coreference rewrite; keeping original query");
                Ok(EnhancedQuery::Rewritten(query.to_string()))
            }
        }
    }
}
