mod common;

use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

use common::{homestead_index, test_config, CountingBackend, DownBackend, ScriptedLm, TableScorer, DIM};
use docqa_core::traits::IndexBackend;
use docqa_core::types::{Degradation, Prompt, Turn, NO_RELEVANT_INFORMATION};
use docqa_core::{Error, Result};
use docqa_embed::HashingEmbedder;
use docqa_hybrid::LocalIndex;
use docqa_pipeline::rerank::TermOverlapScorer;
use docqa_pipeline::{Collaborators, QueryOptions, QueryOrchestrator, Stage};

/// Answers with the first context passage, combines by echoing the partial answers.
fn generator_reply(prompt: &Prompt) -> Result<String> {
    if prompt.user.starts_with("Original question:") {
        return Ok(format!("Combined. {}", prompt.user));
    }
    Ok("According to the documents [1].".to_string())
}

/// Query rewriting model covering all three strategies.
fn rewriter_reply(prompt: &Prompt) -> Result<String> {
    if prompt.system.contains("alternative phrasings") {
        // one usable variant out of two requested
        return Ok(r#"{"queries": ["How much power do the solar panels make?", "how much power do the SOLAR panels make?"]}"#.into());
    }
    if prompt.system.contains("independent things") {
        if prompt.user.contains(" and ") {
            return Ok(r#"{"compound": true, "queries": ["solar panels peak output", "rainwater cistern size liters"]}"#.into());
        }
        return Ok(r#"{"compound": false, "queries": []}"#.into());
    }
    Ok(r#"{"query": "How big is the rainwater cistern?"}"#.into())
}

struct Harness {
    backend: Arc<CountingBackend>,
    generator: Arc<ScriptedLm>,
    rewriter: Arc<ScriptedLm>,
    orchestrator: QueryOrchestrator,
}

fn harness_with(index: LocalIndex, generator: ScriptedLm, rewriter: ScriptedLm) -> Harness {
    docqa_core::logging::init_tracing("warn");
    let backend = Arc::new(CountingBackend::new(index));
    let generator = Arc::new(generator);
    let rewriter = Arc::new(rewriter);
    let orchestrator = QueryOrchestrator::new(
        &test_config(),
        Collaborators {
            backend: backend.clone(),
            embedder: Arc::new(HashingEmbedder::new(DIM)),
            scorer: Arc::new(TermOverlapScorer),
            generator: generator.clone(),
            rewriter: rewriter.clone(),
        },
    );
    Harness { backend, generator, rewriter, orchestrator }
}

fn harness() -> Harness {
    harness_with(homestead_index(), ScriptedLm::new("gen-model", generator_reply), ScriptedLm::new("fast-model", rewriter_reply))
}

#[tokio::test]
async fn plain_question_is_answered_with_citations() {
    let h = harness();
    let result = h.orchestrator.answer("How big is the rainwater cistern?", &[]).await.expect("answer");

    assert_eq!(result.model.as_deref(), Some("gen-model"));
    assert_eq!(result.citations.len(), 1);
    assert_eq!(result.citations[0].index, 1);
    assert_eq!(result.citations[0].chunk_id, "water");
    assert_eq!(result.citations[0].source_page, Some(3));
    assert_eq!(result.citations[0].source_file, "homestead.pdf");
    assert!(result.sources_used <= test_config().rerank.top_n);
    assert_eq!(result.retrieval_queries, vec!["How big is the rainwater cistern?"]);
    assert!(!result.is_degraded());
    assert_eq!(h.backend.keyword_calls(), 1);
    assert_eq!(h.rewriter.calls(), 0);
}

#[tokio::test]
async fn multi_query_with_one_unique_variant_runs_two_retrievals() {
    let h = harness();
    let options = QueryOptions { enable_multi_query: true, ..QueryOptions::default() };
    let result = h.orchestrator.answer_query("What do the solar panels produce?", &[], &options).await.expect("answer");
    assert_eq!(h.backend.keyword_calls(), 2);
    assert_eq!(
        result.retrieval_queries,
        vec!["What do the solar panels produce?", "How much power do the solar panels make?"]
    );
    assert_eq!(result.citations[0].chunk_id, "solar");
}

#[tokio::test]
async fn non_compound_decomposition_answers_once() {
    let h = harness();
    let options = QueryOptions { enable_decomposition: true, ..QueryOptions::default() };
    let result = h.orchestrator.answer_query("How big is the rainwater cistern?", &[], &options).await.expect("answer");
    assert!(result.sub_queries.is_empty());
    assert!(result.sub_answers.is_empty());
    assert_eq!(h.backend.keyword_calls(), 1);
    assert_eq!(h.generator.calls(), 1);
}

#[tokio::test]
async fn compound_question_combines_sub_answers_with_global_citations() {
    let h = harness();
    let options = QueryOptions { enable_decomposition: true, ..QueryOptions::default() };
    let result = h
        .orchestrator
        .answer_query("What is the solar peak output and how large is the cistern?", &[], &options)
        .await
        .expect("answer");

    assert_eq!(result.sub_queries, vec!["solar panels peak output", "rainwater cistern size liters"]);
    assert_eq!(h.backend.keyword_calls(), 2);
    // two sub-answers plus the combining call
    assert_eq!(h.generator.calls(), 3);

    let mut cited: Vec<&str> = result.citations.iter().map(|c| c.chunk_id.as_str()).collect();
    cited.sort_unstable();
    assert_eq!(cited, vec!["solar", "water"]);
    for citation in &result.citations {
        assert!(citation.index >= 1 && citation.index <= result.sources_used);
    }
    assert_ne!(result.citations[0].index, result.citations[1].index);

    let questions: Vec<&str> = result.sub_answers.iter().map(|s| s.question.as_str()).collect();
    assert_eq!(questions, result.sub_queries);
    for sub in &result.sub_answers {
        let marker = sub.answer.split('[').nth(1).and_then(|rest| rest.split(']').next()).expect("marker");
        let n: usize = marker.trim().parse().expect("numeric marker");
        assert!(n >= 1 && n <= result.sources_used, "{} cites [{n}]", sub.question);
    }
}

#[tokio::test]
async fn coreferences_are_resolved_from_history() {
    let h = harness();
    let options = QueryOptions { resolve_coreferences: true, ..QueryOptions::default() };
    let history = vec![Turn::user("Where is rainwater stored?"), Turn::assistant("In a cistern [1].")];
    let result = h.orchestrator.answer_query("How big is it?", &history, &options).await.expect("answer");
    assert_eq!(result.retrieval_queries, vec!["How big is the rainwater cistern?"]);
    assert_eq!(h.rewriter.calls(), 1);

    // without history the resolver is skipped
    h.orchestrator.answer_query("How big is it?", &[], &options).await.expect("answer");
    assert_eq!(h.rewriter.calls(), 1);
}

#[tokio::test]
async fn empty_index_gives_nothing_found_without_generation() {
    let h = harness_with(
        LocalIndex::new(DIM).expect("index"),
        ScriptedLm::new("gen-model", generator_reply),
        ScriptedLm::new("fast-model", rewriter_reply),
    );
    let result = h.orchestrator.answer("Anything about goats?", &[]).await.expect("answer");
    assert_eq!(result.answer, NO_RELEVANT_INFORMATION);
    assert!(result.is_empty_result());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn total_retrieval_failure_fails_in_retrieving() {
    let generator = Arc::new(ScriptedLm::new("gen-model", generator_reply));
    let rewriter = Arc::new(ScriptedLm::new("fast-model", rewriter_reply));
    let orchestrator = QueryOrchestrator::new(
        &test_config(),
        Collaborators {
            backend: Arc::new(DownBackend) as Arc<dyn IndexBackend>,
            embedder: Arc::new(HashingEmbedder::new(DIM)),
            scorer: Arc::new(TermOverlapScorer),
            generator: generator.clone(),
            rewriter,
        },
    );
    let failure = orchestrator.answer("How big is the cistern?", &[]).await.expect_err("fails");
    assert_eq!(failure.stage, Stage::Retrieving);
    assert!(matches!(failure.error, Error::BackendUnavailable(_)));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generation_failure_fails_in_generating() {
    let h = harness_with(homestead_index(), ScriptedLm::failing("gen-model"), ScriptedLm::new("fast-model", rewriter_reply));
    let failure = h.orchestrator.answer("How big is the cistern?", &[]).await.expect_err("fails");
    assert_eq!(failure.stage, Stage::Generating);
    assert!(matches!(failure.error, Error::GenerationUnavailable(_)));
}

#[tokio::test]
async fn scorer_outage_skips_rerank() {
    let backend = Arc::new(CountingBackend::new(homestead_index()));
    let orchestrator = QueryOrchestrator::new(
        &test_config(),
        Collaborators {
            backend,
            embedder: Arc::new(HashingEmbedder::new(DIM)),
            scorer: Arc::new(TableScorer { scores: Vec::new(), fail_marker: Some(""), calls: AtomicU32::new(0) }),
            generator: Arc::new(ScriptedLm::new("gen-model", generator_reply)),
            rewriter: Arc::new(ScriptedLm::new("fast-model", rewriter_reply)),
        },
    );
    let options = QueryOptions { rerank_top_n: 2, ..QueryOptions::default() };
    let result = orchestrator.answer_query("How big is the cistern?", &[], &options).await.expect("answer");
    assert_eq!(result.sources_used, 2);
    assert!(result.degradations.iter().any(|d| matches!(d, Degradation::RerankSkipped { .. })));
}

#[tokio::test]
async fn enhancement_outage_falls_back_to_original_query() {
    let h = harness_with(homestead_index(), ScriptedLm::new("gen-model", generator_reply), ScriptedLm::failing("fast-model"));
    let options = QueryOptions { enable_multi_query: true, ..QueryOptions::default() };
    let result = h.orchestrator.answer_query("How big is the cistern?", &[], &options).await.expect("answer");
    assert_eq!(result.retrieval_queries, vec!["How big is the cistern?"]);
    assert!(matches!(
        result.degradations.as_slice(),
        [Degradation::EnhancementSkipped { strategy, .. }] if strategy == "multi_query"
    ));
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_call() {
    let h = harness();
    let both = QueryOptions { enable_multi_query: true, enable_decomposition: true, ..QueryOptions::default() };
    let failure = h.orchestrator.answer_query("q", &[], &both).await.expect_err("rejected");
    assert_eq!(failure.stage, Stage::Enhancing);
    assert!(matches!(failure.error, Error::InvalidRequest(_)));

    let failure = h.orchestrator.answer("   ", &[]).await.expect_err("rejected");
    assert!(matches!(failure.error, Error::InvalidRequest(_)));
    assert_eq!(h.backend.keyword_calls(), 0);
}

#[tokio::test]
async fn dropping_the_request_cancels_generation() {
    let h = harness_with(
        homestead_index(),
        ScriptedLm::new("gen-model", generator_reply).with_delay(Duration::from_secs(5)),
        ScriptedLm::new("fast-model", rewriter_reply),
    );
    let outcome = tokio::time::timeout(Duration::from_millis(100), h.orchestrator.answer("How big is the cistern?", &[])).await;
    assert!(outcome.is_err());
    // the generator was reached once and nothing retried after the drop
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.generator.calls(), 1);
}
