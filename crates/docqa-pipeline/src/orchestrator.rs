//! Per-request state machine:
//! `Enhancing -> Retrieving -> Fusing -> Reranking -> Generating -> Done`,
//! with `Failed` (a [`QueryFailure`]) reachable from every stage.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use thiserror::Error;
use tracing::{debug, info, warn};

use docqa_core::config::PipelineConfig;
use docqa_core::fusion::fuse;
use docqa_core::policy::CallPolicy;
use docqa_core::traits::{Embedder, IndexBackend, LanguageModel, RelevanceScorer};
use docqa_core::types::{as_ranked_list, Degradation, EnhancedQuery, FusedCandidate, QueryResult, SubAnswer, Turn};
use docqa_core::Error;
use docqa_embed::EmbeddingProvider;
use docqa_hybrid::{HybridRetriever, Retrieval};

use crate::enhance::{CoreferenceResolver, EnhancementStrategy, MultiQueryExpander, QueryDecomposer};
use crate::llm::OpenAiChat;
use crate::rerank::{Reranker, ScoringProvider};
use crate::synthesis::citations::remap_markers;
use crate::synthesis::AnswerSynthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Enhancing,
    Retrieving,
    Fusing,
    Reranking,
    Generating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enhancing => "enhancing",
            Self::Retrieving => "retrieving",
            Self::Fusing => "fusing",
            Self::Reranking => "reranking",
            Self::Generating => "generating",
        })
    }
}

/// Terminal failure of a request, with the stage it failed in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query failed while {stage}: {error}")]
pub struct QueryFailure {
    pub stage: Stage,
    #[source]
    pub error: Error,
}

fn fail(stage: Stage, error: Error) -> QueryFailure {
    warn!(%stage, %error, "query failed");
    QueryFailure { stage, error }
}

/// Per-request switches. Multi-query and decomposition are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub enable_multi_query: bool,
    pub enable_decomposition: bool,
    pub enable_reranking: bool,
    pub resolve_coreferences: bool,
    pub top_k: usize,
    pub rerank_top_n: usize,
}

impl QueryOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            enable_multi_query: false,
            enable_decomposition: false,
            enable_reranking: config.rerank.enabled,
            resolve_coreferences: config.enhance.resolve_coreferences,
            top_k: config.retrieval.top_k,
            rerank_top_n: config.rerank.top_n,
        }
    }

    fn validate(&self, query: &str) -> Result<(), Error> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest("query is empty".into()));
        }
        if self.enable_multi_query && self.enable_decomposition {
            return Err(Error::InvalidRequest("multi-query and decomposition cannot be combined".into()));
        }
        if self.top_k == 0 || self.rerank_top_n == 0 {
            return Err(Error::InvalidRequest("top_k and rerank_top_n must be positive".into()));
        }
        Ok(())
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// External capabilities the pipeline is built over.
pub struct Collaborators {
    pub backend: Arc<dyn IndexBackend>,
    pub embedder: Arc<dyn Embedder>,
    pub scorer: Arc<dyn RelevanceScorer>,
    /// Model for answers and the final combination.
    pub generator: Arc<dyn LanguageModel>,
    /// Model for query rewriting.
    pub rewriter: Arc<dyn LanguageModel>,
}

enum Plan {
    /// Retrieve for every query and fuse into one context.
    Fused(Vec<String>),
    /// Answer every sub-query separately, then combine.
    Decomposed(Vec<String>),
}

pub struct QueryOrchestrator {
    retriever: HybridRetriever,
    reranker: Reranker,
    synthesizer: AnswerSynthesizer,
    coreference: CoreferenceResolver,
    multi_query: MultiQueryExpander,
    decomposer: QueryDecomposer,
    rrf_k: u32,
    defaults: QueryOptions,
}

impl QueryOrchestrator {
    pub fn new(config: &PipelineConfig, parts: Collaborators) -> Self {
        let policy = CallPolicy::from(&config.calls);
        Self {
            retriever: HybridRetriever::new(parts.backend, parts.embedder, policy.clone(), config.retrieval.rrf_k),
            reranker: Reranker::new(parts.scorer, policy.clone()),
            synthesizer: AnswerSynthesizer::new(parts.generator, policy.clone(), config.llm.temperature),
            coreference: CoreferenceResolver::new(Arc::clone(&parts.rewriter), policy.clone()),
            multi_query: MultiQueryExpander::new(Arc::clone(&parts.rewriter), policy.clone(), config.enhance.num_variants),
            decomposer: QueryDecomposer::new(parts.rewriter, policy),
            rrf_k: config.retrieval.rrf_k,
            defaults: QueryOptions::from_config(config),
        }
    }

    /// Build the configured providers around `backend`.
    pub fn from_config(config: &PipelineConfig, backend: Arc<dyn IndexBackend>) -> Self {
        Self::new(
            config,
            Collaborators {
                backend,
                embedder: Arc::new(EmbeddingProvider::from_config(&config.embedding)),
                scorer: Arc::new(ScoringProvider::from_config(&config.scoring)),
                generator: Arc::new(OpenAiChat::generator(&config.llm)),
                rewriter: Arc::new(OpenAiChat::rewriter(&config.llm)),
            },
        )
    }

    /// [`answer_query`](Self::answer_query) with the configured defaults.
    pub async fn answer(&self, query: &str, history: &[Turn]) -> Result<QueryResult, QueryFailure> {
        self.answer_query(query, history, &self.defaults).await
    }

    /// Answer one question. Every sub-operation runs inside the returned
    /// future, so dropping it cancels all in-flight calls.
    pub async fn answer_query(&self, query: &str, history: &[Turn], options: &QueryOptions) -> Result<QueryResult, QueryFailure> {
        info!(stage = %Stage::Enhancing, query, history = history.len(), "query started");
        options.validate(query).map_err(|e| fail(Stage::Enhancing, e))?;
        let mut degradations = Vec::new();

        let resolved = self.resolve(query, history, options, &mut degradations).await;
        let mut result = match self.plan(&resolved, history, options, &mut degradations).await {
            Plan::Fused(queries) => self.run_fused(&resolved, queries, options, &mut degradations).await?,
            Plan::Decomposed(sub_queries) => self.run_decomposed(&resolved, sub_queries, options, &mut degradations).await?,
        };
        result.degradations = degradations;
        info!(
            sources = result.sources_used,
            citations = result.citations.len(),
            degraded = result.is_degraded(),
            "query done"
        );
        Ok(result)
    }

    async fn resolve(&self, query: &str, history: &[Turn], options: &QueryOptions, degradations: &mut Vec<Degradation>) -> String {
        if !options.resolve_coreferences || history.is_empty() {
            return query.to_string();
        }
        match self.coreference.enhance(query, history).await {
            Ok(EnhancedQuery::Rewritten(q)) => q,
            Ok(_) => query.to_string(),
            Err(e) => {
                degradations.push(skipped(&self.coreference, &e));
                query.to_string()
            }
        }
    }

    async fn plan(&self, query: &str, history: &[Turn], options: &QueryOptions, degradations: &mut Vec<Degradation>) -> Plan {
        if options.enable_decomposition {
            return match self.decomposer.enhance(query, history).await {
                Ok(EnhancedQuery::SubQueries(parts)) if parts.len() > 1 => Plan::Decomposed(parts),
                Ok(_) => Plan::Fused(vec![query.to_string()]),
                Err(e) => {
                    degradations.push(skipped(&self.decomposer, &e));
                    Plan::Fused(vec![query.to_string()])
                }
            };
        }
        let mut queries = vec![query.to_string()];
        if options.enable_multi_query {
            match self.multi_query.enhance(query, history).await {
                Ok(EnhancedQuery::Variants(variants)) => queries.extend(variants),
                Ok(_) => {}
                Err(e) => degradations.push(skipped(&self.multi_query, &e)),
            }
        }
        Plan::Fused(queries)
    }

    /// Retrieve every query concurrently; fails only if all of them fail.
    /// Successful retrievals keep the index of their query.
    async fn retrieve_all(
        &self,
        queries: &[String],
        top_k: usize,
        degradations: &mut Vec<Degradation>,
    ) -> Result<Vec<(usize, Retrieval)>, QueryFailure> {
        info!(stage = %Stage::Retrieving, queries = queries.len(), top_k, "retrieving");
        let outcomes = join_all(queries.iter().map(|q| self.retriever.retrieve(q, top_k))).await;
        let mut retrieved = Vec::with_capacity(outcomes.len());
        let mut last_error = None;
        for (i, (query, outcome)) in queries.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(retrieval) => {
                    degradations.extend(retrieval.degradation.clone());
                    retrieved.push((i, retrieval));
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "retrieval failed");
                    degradations.push(Degradation::RetrievalFailed { query: query.clone() });
                    last_error = Some(e);
                }
            }
        }
        if retrieved.is_empty() {
            let error = last_error.unwrap_or_else(|| Error::BackendUnavailable("no retrieval was attempted".into()));
            return Err(fail(Stage::Retrieving, error));
        }
        Ok(retrieved)
    }

    /// Rerank when enabled. A scorer outage keeps fused order, cut to `rerank_top_n`.
    async fn rerank(&self, query: &str, candidates: Vec<FusedCandidate>, options: &QueryOptions) -> (Vec<FusedCandidate>, Option<Degradation>) {
        if !options.enable_reranking || candidates.is_empty() {
            return (candidates, None);
        }
        info!(stage = %Stage::Reranking, query, candidates = candidates.len(), top_n = options.rerank_top_n, "reranking");
        match self.reranker.rerank(query, candidates.clone(), options.rerank_top_n).await {
            Ok(reranked) => (reranked, None),
            Err(e) => {
                warn!(error = %e, "rerank skipped; keeping fused order");
                let mut kept = candidates;
                kept.truncate(options.rerank_top_n);
                (kept, Some(Degradation::RerankSkipped { reason: e.to_string() }))
            }
        }
    }

    async fn run_fused(
        &self,
        query: &str,
        queries: Vec<String>,
        options: &QueryOptions,
        degradations: &mut Vec<Degradation>,
    ) -> Result<QueryResult, QueryFailure> {
        let retrieved = self.retrieve_all(&queries, options.top_k, degradations).await?;

        info!(stage = %Stage::Fusing, lists = retrieved.len(), "fusing");
        let candidates = if retrieved.len() == 1 {
            retrieved.into_iter().next().map(|(_, r)| r.candidates).unwrap_or_default()
        } else {
            let lists: Vec<_> = retrieved.iter().map(|(_, r)| as_ranked_list(&r.candidates)).collect();
            let mut fused = fuse(&lists, self.rrf_k);
            fused.truncate(options.top_k);
            fused
        };

        let (candidates, rerank_degradation) = self.rerank(query, candidates, options).await;
        degradations.extend(rerank_degradation);

        info!(stage = %Stage::Generating, sources = candidates.len(), "generating");
        let mut result = self
            .synthesizer
            .synthesize(query, &candidates)
            .await
            .map_err(|e| fail(Stage::Generating, e))?;
        result.retrieval_queries = queries;
        Ok(result)
    }

    async fn run_decomposed(
        &self,
        query: &str,
        sub_queries: Vec<String>,
        options: &QueryOptions,
        degradations: &mut Vec<Degradation>,
    ) -> Result<QueryResult, QueryFailure> {
        let retrieved = self.retrieve_all(&sub_queries, options.top_k, degradations).await?;
        debug!(stage = %Stage::Fusing, contexts = retrieved.len(), "sub-query contexts kept separate");

        let reranked = join_all(retrieved.into_iter().map(|(i, r)| {
            let sub_query = sub_queries[i].as_str();
            async move { (i, self.rerank(sub_query, r.candidates, options).await) }
        }))
        .await;
        let mut contexts: Vec<(usize, Vec<FusedCandidate>)> = Vec::with_capacity(reranked.len());
        for (i, (candidates, degradation)) in reranked {
            degradations.extend(degradation);
            contexts.push((i, candidates));
        }

        info!(stage = %Stage::Generating, parts = contexts.len(), "answering sub-queries");
        // Global numbering: every distinct chunk across the sub-contexts.
        let lists: Vec<_> = contexts.iter().map(|(_, c)| as_ranked_list(c)).collect();
        let pool = fuse(&lists, self.rrf_k);
        if pool.is_empty() {
            return Ok(QueryResult {
                retrieval_queries: sub_queries.clone(),
                sub_queries,
                ..QueryResult::no_relevant_information()
            });
        }
        let positions: HashMap<&str, usize> = pool.iter().enumerate().map(|(i, c)| (c.chunk.id.as_str(), i + 1)).collect();

        let partials = try_join_all(contexts.iter().map(|(i, c)| self.synthesizer.synthesize(&sub_queries[*i], c)))
            .await
            .map_err(|e| fail(Stage::Generating, e))?;
        let parts: Vec<SubAnswer> = contexts
            .iter()
            .zip(partials)
            .map(|((i, local), partial)| SubAnswer {
                question: sub_queries[*i].clone(),
                answer: remap_markers(&partial.answer, |n| {
                    n.checked_sub(1)
                        .and_then(|j| local.get(j))
                        .and_then(|c| positions.get(c.chunk.id.as_str()).copied())
                }),
            })
            .collect();

        let mut result = self
            .synthesizer
            .combine(query, &parts, &pool)
            .await
            .map_err(|e| fail(Stage::Generating, e))?;
        result.retrieval_queries = sub_queries.clone();
        result.sub_queries = sub_queries;
        result.sub_answers = parts;
        Ok(result)
    }
}

fn skipped(strategy: &dyn EnhancementStrategy, error: &Error) -> Degradation {
    warn!(strategy = strategy.name(), %error, "enhancement skipped; using original query");
    Degradation::EnhancementSkipped { strategy: strategy.name().to_string(), reason: error.to_string() }
}
