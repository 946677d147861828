use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use docqa_core::config::{ScoringConfig, ScoringProviderKind};
use docqa_core::traits::RelevanceScorer;
use docqa_core::{Error, Result};

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Local scorer: share of query terms found in the candidate, with a small
/// bonus for the whole query appearing verbatim.
pub struct TermOverlapScorer;

impl TermOverlapScorer {
    #[allow(clippy::cast_precision_loss)]
    pub fn score_sync(query: &str, candidate_text: &str) -> f32 {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let candidate_terms = terms(candidate_text);
        let hits = query_terms.iter().filter(|t| candidate_terms.contains(*t)).count();
        let mut score = hits as f32 / query_terms.len() as f32;
        if candidate_text.to_lowercase().contains(query.trim().to_lowercase().as_str()) {
            score += 0.1;
        }
        score
    }
}

#[async_trait]
impl RelevanceScorer for TermOverlapScorer {
    fn scorer_id(&self) -> &str {
        "term-overlap"
    }

    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32> {
        Ok(Self::score_sync(query, candidate_text))
    }
}

/// Client for a rerank service: `POST {query, documents} -> {scores}`.
pub struct RemoteScorer {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: [&'a str; 1],
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

impl RemoteScorer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl RelevanceScorer for RemoteScorer {
    fn scorer_id(&self) -> &str {
        &self.url
    }

    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32> {
        let response = self
            .client
            .post(&self.url)
            .json(&RerankRequest { query, documents: [candidate_text] })
            .send()
            .await
            .map_err(|e| Error::ScoringUnavailable(format!("HTTP error: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ScoringUnavailable(format!("rerank service returned {status}")));
        }
        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| Error::ScoringUnavailable(format!("JSON parse error: {e}")))?;
        parsed
            .scores
            .first()
            .copied()
            .ok_or_else(|| Error::ScoringUnavailable("empty scores".into()))
    }
}

pub enum ScoringProvider {
    Local(TermOverlapScorer),
    Remote(RemoteScorer),
}

impl ScoringProvider {
    pub fn from_config(config: &ScoringConfig) -> Self {
        match config.provider {
            ScoringProviderKind::TermOverlap => {
                info!("using term-overlap relevance scoring");
                Self::Local(TermOverlapScorer)
            }
            ScoringProviderKind::Remote => {
                info!(url = %config.url, "using remote relevance scoring");
                Self::Remote(RemoteScorer::new(config.url.clone()))
            }
        }
    }

    fn inner(&self) -> &dyn RelevanceScorer {
        match self {
            Self::Local(s) => s,
            Self::Remote(s) => s,
        }
    }
}

#[async_trait]
impl RelevanceScorer for ScoringProvider {
    fn scorer_id(&self) -> &str {
        self.inner().scorer_id()
    }

    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32> {
        self.inner().score(query, candidate_text).await
    }
}
