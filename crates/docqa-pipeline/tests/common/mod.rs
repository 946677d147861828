#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docqa_core::config::PipelineConfig;
use docqa_core::policy::CallPolicy;
use docqa_core::traits::{IndexBackend, LanguageModel, RelevanceScorer};
use docqa_core::types::{Chunk, ChunkKind, FusedCandidate, Prompt, RankedCandidate};
use docqa_core::{Error, Result};
use docqa_embed::HashingEmbedder;
use docqa_hybrid::LocalIndex;

pub const DIM: usize = 128;

type Handler = Box<dyn Fn(&Prompt) -> Result<String> + Send + Sync>;

/// Language model answering from a closure and recording every prompt.
pub struct ScriptedLm {
    id: String,
    handler: Handler,
    pub prompts: Mutex<Vec<Prompt>>,
    delay: Option<Duration>,
}

impl ScriptedLm {
    pub fn new(id: &str, handler: impl Fn(&Prompt) -> Result<String> + Send + Sync + 'static) -> Self {
        Self { id: id.to_string(), handler: Box::new(handler), prompts: Mutex::new(Vec::new()), delay: None }
    }

    pub fn replying(id: &str, reply: &'static str) -> Self {
        Self::new(id, move |_| Ok(reply.to_string()))
    }

    pub fn failing(id: &str) -> Self {
        Self::new(id, |_| Err(Error::GenerationUnavailable("model overloaded".into())))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("lock").len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLm {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().expect("lock").push(prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(prompt)
    }
}

/// Scorer returning a fixed score per chunk text, failing for texts containing `fail_marker`.
pub struct TableScorer {
    pub scores: Vec<(&'static str, f32)>,
    pub fail_marker: Option<&'static str>,
    pub calls: AtomicU32,
}

#[async_trait]
impl RelevanceScorer for TableScorer {
    fn scorer_id(&self) -> &str {
        "table"
    }

    async fn score(&self, _query: &str, candidate_text: &str) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_marker.is_some_and(|m| candidate_text.contains(m)) {
            return Err(Error::ScoringUnavailable("scorer crashed".into()));
        }
        Ok(self.scores.iter().find(|(t, _)| candidate_text.contains(t)).map_or(0.0, |(_, s)| *s))
    }
}

/// Counts keyword searches so tests can observe how many retrievals ran.
pub struct CountingBackend {
    pub inner: LocalIndex,
    pub keyword_calls: AtomicU32,
}

impl CountingBackend {
    pub fn new(inner: LocalIndex) -> Self {
        Self { inner, keyword_calls: AtomicU32::new(0) }
    }

    pub fn keyword_calls(&self) -> u32 {
        self.keyword_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexBackend for CountingBackend {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn search_keyword(&self, text: &str, top_k: usize) -> Result<Vec<RankedCandidate>> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search_keyword(text, top_k).await
    }

    async fn search_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<RankedCandidate>> {
        self.inner.search_vector(vector, top_k).await
    }
}

pub struct DownBackend;

#[async_trait]
impl IndexBackend for DownBackend {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn search_keyword(&self, _text: &str, _top_k: usize) -> Result<Vec<RankedCandidate>> {
        Err(Error::BackendUnavailable("connection refused".into()))
    }

    async fn search_vector(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<RankedCandidate>> {
        Err(Error::BackendUnavailable("connection refused".into()))
    }
}

pub fn homestead_chunks() -> Vec<Chunk> {
    let embedder = HashingEmbedder::new(DIM);
    [
        ("solar", "Solar panels on the barn roof produce 6 kW at peak.", ChunkKind::Text, 1),
        ("battery", "The battery bank stores 20 kWh for overnight use.", ChunkKind::Text, 2),
        ("water", "Rainwater is collected in a 5000 liter cistern.", ChunkKind::Text, 3),
        ("garden", "The garden uses drip irrigation fed from the cistern.", ChunkKind::ImageCaption, 4),
    ]
    .into_iter()
    .map(|(id, text, kind, page)| {
        Chunk::new(id, text)
            .with_kind(kind)
            .with_page(page)
            .with_source_file("homestead.pdf")
            .with_vector(embedder.embed_sync(text))
    })
    .collect()
}

pub fn homestead_index() -> LocalIndex {
    LocalIndex::from_chunks(DIM, homestead_chunks()).expect("index")
}

pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.embedding.dim = DIM;
    config.calls.timeout_ms = 500;
    config.calls.read_retries = 1;
    config.calls.generation_retries = 1;
    config.calls.backoff_ms = 1;
    config.calls.max_backoff_ms = 2;
    config
}

pub fn fast_policy() -> CallPolicy {
    CallPolicy::from(&test_config().calls)
}

pub fn fused(ids_and_texts: &[(&str, &str)]) -> Vec<FusedCandidate> {
    ids_and_texts
        .iter()
        .enumerate()
        .map(|(i, (id, text))| FusedCandidate {
            chunk: Arc::new(Chunk::new(*id, *text).with_page(u32::try_from(i).unwrap_or(0))),
            fusion_score: 1.0 / (61.0 + i as f64),
            rank: i + 1,
            rerank_score: None,
        })
        .collect()
}
