//! Domain types shared by retrieval, ranking and generation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// What an indexed chunk was extracted from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkKind {
    #[default]
    Text,
    ImageCaption,
    TableSummary,
}

impl ChunkKind {
    /// Short label used when annotating generation context.
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ImageCaption => "image",
            Self::TableSummary => "table",
        }
    }
}

/// An indexed, retrievable unit.
///
/// - `id`: unique within one index
/// - `vector`: embedding, dimension fixed per index
/// - `source_page`: page number as recorded at extraction, when known
/// - `metadata`: opaque extraction metadata (e.g. `table_markdown`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    #[serde(default)]
    pub vector: Vec<f32>,
    #[serde(default)]
    pub kind: ChunkKind,
    pub source_page: Option<u32>,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            vector: Vec::new(),
            kind: ChunkKind::Text,
            source_page: None,
            source_file: String::new(),
            metadata: Meta::new(),
        }
    }

    #[must_use]
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = vector;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ChunkKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.source_page = Some(page);
        self
    }

    #[must_use]
    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = file.into();
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One entry of a backend-native ranked list. `score` is backend-specific
/// and never compared across backends.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub chunk: Arc<Chunk>,
    pub rank: usize,
    pub score: Option<f32>,
}

impl RankedCandidate {
    /// Assign 1-based ranks to hits already in backend order.
    pub fn rank_list<I>(hits: I) -> Vec<RankedCandidate>
    where
        I: IntoIterator<Item = (Arc<Chunk>, Option<f32>)>,
    {
        hits.into_iter()
            .enumerate()
            .map(|(i, (chunk, score))| RankedCandidate { chunk, rank: i + 1, score })
            .collect()
    }
}

/// A candidate after Reciprocal Rank Fusion.
///
/// `rank` is the position in the fused list it came from and is never
/// rewritten by later stages; `rerank_score` is filled in by the reranker.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub chunk: Arc<Chunk>,
    pub fusion_score: f64,
    pub rank: usize,
    pub rerank_score: Option<f32>,
}

/// Re-rank a list by position so it can be fed back into fusion.
#[allow(clippy::cast_possible_truncation)]
pub fn as_ranked_list(candidates: &[FusedCandidate]) -> Vec<RankedCandidate> {
    RankedCandidate::rank_list(
        candidates
            .iter()
            .map(|c| (Arc::clone(&c.chunk), c.rerank_score.or(Some(c.fusion_score as f32)))),
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// One prior conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Output of a query enhancement strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancedQuery {
    /// Coreference-resolved, self-contained question.
    Rewritten(String),
    /// Alternate phrasings of the question, excluding the original.
    Variants(Vec<String>),
    /// Independent questions answered separately and combined.
    SubQueries(Vec<String>),
}

/// Request sent to a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Ask the model for a single JSON object.
    pub json: bool,
    pub temperature: Option<f32>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { system: system.into(), user: user.into(), json: false, temperature: None }
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub index: usize,
    pub chunk_id: ChunkId,
    pub source_page: Option<u32>,
    pub source_file: String,
    pub kind: ChunkKind,
    pub snippet: String,
}

/// A capability that was lost while answering, without failing the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Degradation {
    /// Vector search or query embedding failed; keyword results only.
    KeywordOnly { query: String },
    /// Keyword search failed; vector results only.
    VectorOnly { query: String },
    /// Retrieval for one of several queries failed.
    RetrievalFailed { query: String },
    RerankSkipped { reason: String },
    EnhancementSkipped { strategy: String, reason: String },
}

pub const NO_RELEVANT_INFORMATION: &str =
    "Sorry, no relevant information was found in the documents to answer this question.";

/// The answer produced for one sub-question of a decomposed query, with its
/// citation markers already pointing into the combined source list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubAnswer {
    pub question: String,
    pub answer: String,
}

/// Terminal artifact of one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub sources_used: usize,
    /// `None` when no model was called.
    pub model: Option<String>,
    /// Every query string retrieval ran for.
    #[serde(default)]
    pub retrieval_queries: Vec<String>,
    #[serde(default)]
    pub sub_queries: Vec<String>,
    #[serde(default)]
    pub sub_answers: Vec<SubAnswer>,
    #[serde(default)]
    pub degradations: Vec<Degradation>,
}

impl QueryResult {
    /// The well-formed answer for an empty context.
    pub fn no_relevant_information() -> Self {
        Self {
            answer: NO_RELEVANT_INFORMATION.to_string(),
            citations: Vec::new(),
            sources_used: 0,
            model: None,
            retrieval_queries: Vec::new(),
            sub_queries: Vec::new(),
            sub_answers: Vec::new(),
            degradations: Vec::new(),
        }
    }

    pub fn is_empty_result(&self) -> bool {
        self.sources_used == 0 && self.citations.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}
