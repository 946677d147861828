mod common;

use std::sync::Arc;

use common::{fast_policy, fused, ScriptedLm};
use docqa_core::types::{SubAnswer, NO_RELEVANT_INFORMATION};
use docqa_core::Error;
use docqa_pipeline::synthesis::AnswerSynthesizer;

fn synthesizer(lm: &Arc<ScriptedLm>) -> AnswerSynthesizer {
    AnswerSynthesizer::new(lm.clone(), fast_policy(), 0.3)
}

#[tokio::test]
async fn empty_context_skips_the_model() {
    let lm = Arc::new(ScriptedLm::replying("gen", "should not be used [1]"));
    let result = synthesizer(&lm).synthesize("anything?", &[]).await.expect("synthesize");
    assert_eq!(lm.calls(), 0);
    assert_eq!(result.answer, NO_RELEVANT_INFORMATION);
    assert!(result.citations.is_empty());
    assert_eq!(result.sources_used, 0);
    assert_eq!(result.model, None);
    assert!(result.is_empty_result());
}

#[tokio::test]
async fn citations_are_the_markers_that_appear() {
    let lm = Arc::new(ScriptedLm::replying("gen", "Beta holds [2]. Also [9], and both [2, 1]."));
    let candidates = fused(&[("a", "alpha"), ("b", "beta"), ("c", "gamma")]);
    let result = synthesizer(&lm).synthesize("q", &candidates).await.expect("synthesize");

    let indices: Vec<usize> = result.citations.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(result.citations[0].chunk_id, "a");
    assert_eq!(result.citations[1].chunk_id, "b");
    assert_eq!(result.citations[1].source_page, Some(1));
    assert_eq!(result.citations[1].snippet, "beta");
    assert_eq!(result.sources_used, 3);
    assert_eq!(result.model.as_deref(), Some("gen"));
}

#[tokio::test]
async fn prompt_numbers_the_context() {
    let lm = Arc::new(ScriptedLm::replying("gen", "ok"));
    let candidates = fused(&[("a", "alpha"), ("b", "beta")]);
    synthesizer(&lm).synthesize("what is beta?", &candidates).await.expect("synthesize");
    let prompts = lm.prompts.lock().expect("lock");
    let user = &prompts[0].user;
    assert!(user.contains("[1] [text - page 0] alpha"));
    assert!(user.contains("[2] [text - page 1] beta"));
    assert!(user.contains("Question: what is beta?"));
    assert_eq!(prompts[0].temperature, Some(0.3));
}

#[tokio::test]
async fn generation_failure_after_retries() {
    let lm = Arc::new(ScriptedLm::failing("gen"));
    let err = synthesizer(&lm).synthesize("q", &fused(&[("a", "alpha")])).await.expect_err("fails");
    assert!(matches!(err, Error::GenerationUnavailable(_)));
    // first attempt plus one generation retry
    assert_eq!(lm.calls(), 2);
}

#[tokio::test]
async fn combine_resolves_citations_against_the_pool() {
    let lm = Arc::new(ScriptedLm::new("gen", |p| Ok(format!("Merged: {}", p.user))));
    let pool = fused(&[("a", "alpha"), ("b", "beta"), ("c", "gamma")]);
    let parts = vec![
        SubAnswer { question: "first?".into(), answer: "alpha [1]".into() },
        SubAnswer { question: "second?".into(), answer: "gamma [3]".into() },
    ];
    let result = synthesizer(&lm).combine("first and second?", &parts, &pool).await.expect("combine");
    let ids: Vec<&str> = result.citations.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(lm.calls(), 1);
}
