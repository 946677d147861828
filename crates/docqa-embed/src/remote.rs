use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_core::config::EmbeddingConfig;
use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
	client: reqwest::Client,
	endpoint: String,
	model: String,
	api_key: Option<String>,
	dim: usize,
	id: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
	model: &'a str,
	input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
	data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
	embedding: Vec<f32>,
}

impl RemoteEmbedder {
	pub fn new(config: &EmbeddingConfig) -> Self {
		Self {
			client: reqwest::Client::new(),
			endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
			model: config.model.clone(),
			api_key: config.api_key.clone(),
			dim: config.dim,
			id: format!("remote:{}", config.model),
		}
	}
}

#[async_trait]
impl Embedder for RemoteEmbedder {
	fn embedder_id(&self) -> &str { &self.id }

	fn dim(&self) -> usize { self.dim }

	async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		let mut req = self.client.post(&self.endpoint).json(&EmbedRequest { model: &self.model, input: vec![text] });
		if let Some(key) = &self.api_key { req = req.bearer_auth(key); }
		let response = req.send().await.map_err(|e| Error::EmbeddingUnavailable(format!("HTTP error: {e}")))?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Error::EmbeddingUnavailable(format!("API returned {status}: {body}")));
		}
		let resp: EmbedResponse = response.json().await.map_err(|e| Error::EmbeddingUnavailable(format!("JSON parse error: {e}")))?;
		let vector = resp.data.into_iter().next().map(|d| d.embedding).ok_or_else(|| Error::EmbeddingUnavailable("empty response".into()))?;
		if vector.len() != self.dim { return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() }); }
		debug!(model = %self.model, dim = vector.len(), "remote embedding");
		Ok(vector)
	}
}
