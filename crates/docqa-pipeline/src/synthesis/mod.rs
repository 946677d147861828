//! Citation-grounded answer generation.

pub mod citations;
pub mod context;

use std::fmt::Write;
use std::sync::Arc;

use tracing::{debug, info};

use docqa_core::policy::{CallPolicy, Operation};
use docqa_core::traits::LanguageModel;
use docqa_core::types::{FusedCandidate, Prompt, QueryResult, SubAnswer};
use docqa_core::Result;

use citations::build_citations;
use context::format_context;

const ANSWER_SYSTEM: &str = "You answer questions about a document collection. \
Use only the numbered context passages provided; do not rely on outside knowledge. \
After each statement, cite the passages that support it with their bracketed numbers, e.g. [1] or [2, 3]. \
Only cite numbers that appear in the context. \
If the context does not contain the answer, say that the documents do not cover it.";

const COMBINE_SYSTEM: &str = "You merge partial answers into one coherent answer to the original question. \
Each partial answer already cites its sources with bracketed numbers; keep those citations exactly as written \
next to the statements they support and do not invent new ones. \
Do not add information that is not in the partial answers.";

pub struct AnswerSynthesizer {
    lm: Arc<dyn LanguageModel>,
    policy: CallPolicy,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(lm: Arc<dyn LanguageModel>, policy: CallPolicy, temperature: f32) -> Self {
        Self { lm, policy, temperature }
    }

    async fn generate(&self, prompt: Prompt) -> Result<String> {
        self.policy.run(Operation::Generate, || self.lm.complete(&prompt)).await
    }

    /// Answer `query` from `candidates`, citing them by 1-based position.
    ///
    /// Empty candidates produce the "nothing relevant" answer without
    /// calling the model.
    pub async fn synthesize(&self, query: &str, candidates: &[FusedCandidate]) -> Result<QueryResult> {
        if candidates.is_empty() {
            debug!(query, "no context; skipping generation");
            return Ok(QueryResult::no_relevant_information());
        }
        let user = format!("Context:\n{}\n\nQuestion: {query}\n\nAnswer:", format_context(candidates));
        let answer = self.generate(Prompt::new(ANSWER_SYSTEM, user).with_temperature(self.temperature)).await?;
        let citations = build_citations(&answer, candidates);
        info!(query, sources = candidates.len(), cited = citations.len(), "answer generated");
        Ok(QueryResult {
            answer,
            citations,
            sources_used: candidates.len(),
            model: Some(self.lm.model_id().to_string()),
            ..QueryResult::no_relevant_information()
        })
    }

    /// Merge sub-answers whose markers already index into `pool` with one
    /// model call; citations resolve against `pool`.
    pub async fn combine(&self, query: &str, parts: &[SubAnswer], pool: &[FusedCandidate]) -> Result<QueryResult> {
        if pool.is_empty() {
            return Ok(QueryResult::no_relevant_information());
        }
        let mut user = format!("Original question: {query}\n\nPartial answers:\n");
        for (i, part) in parts.iter().enumerate() {
            let _ = write!(user, "\n{}. Question: {}\n   Answer: {}\n", i + 1, part.question, part.answer);
        }
        user.push_str("\nCombined answer:");
        let answer = self.generate(Prompt::new(COMBINE_SYSTEM, user).with_temperature(self.temperature)).await?;
        let citations = build_citations(&answer, pool);
        info!(query, parts = parts.len(), sources = pool.len(), cited = citations.len(), "sub-answers combined");
        Ok(QueryResult {
            answer,
            citations,
            sources_used: pool.len(),
            model: Some(self.lm.model_id().to_string()),
            ..QueryResult::no_relevant_information()
        })
    }
}
