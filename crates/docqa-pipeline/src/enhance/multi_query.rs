use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use docqa_core::policy::{CallPolicy, Operation};
use docqa_core::traits::LanguageModel;
use docqa_core::types::{EnhancedQuery, Prompt, Turn};
use docqa_core::Result;

use super::{dedup_case_insensitive, parse_json_object, string_list, EnhancementStrategy};

const SYSTEM: &str = "You help a document search engine find relevant passages. \
Given a question, write alternative phrasings that keep its meaning but vary wording, \
synonyms and level of detail. \
Respond with a JSON object: {\"queries\": [\"...\", \"...\"]}.";

/// Generates alternate phrasings of a question for multi-query retrieval.
pub struct MultiQueryExpander {
    lm: Arc<dyn LanguageModel>,
    policy: CallPolicy,
    num_variants: usize,
}

impl MultiQueryExpander {
    pub fn new(lm: Arc<dyn LanguageModel>, policy: CallPolicy, num_variants: usize) -> Self {
        Self { lm, policy, num_variants }
    }
}

#[async_trait]
impl EnhancementStrategy for MultiQueryExpander {
    fn name(&self) -> &'static str {
        "multi_query"
    }

    /// Variants exclude the original question; an empty list means only the
    /// original is searched.
    async fn enhance(&self, query: &str, _history: &[Turn]) -> Result<EnhancedQuery> {
        if self.num_variants == 0 {
            return Ok(EnhancedQuery::Variants(Vec::new()));
        }
        let prompt = Prompt::new(
            SYSTEM,
            format!("Write {} alternative phrasings of this question:\n{query}", self.num_variants),
        )
        .json()
        .with_temperature(0.7);
        let raw = self.policy.run(Operation::Generate, || self.lm.complete(&prompt)).await?;
        let Some(value) = parse_json_object(&raw) else {
            warn!(raw = %raw, "unusable query variants; searching original only");
            return Ok(EnhancedQuery::Variants(Vec::new()));
        };
        let mut variants = dedup_case_insensitive(string_list(&value, "queries"), Some(query));
        variants.truncate(self.num_variants);
        debug!(requested = self.num_variants, usable = variants.len(), "query variants generated");
        Ok(EnhancedQuery::Variants(variants))
    }
}
