//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_core::config::LlmConfig;
use docqa_core::traits::LanguageModel;
use docqa_core::types::Prompt;
use docqa_core::{Error, Result};

pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl OpenAiChat {
    /// Client for `model` at `config.base_url`.
    pub fn new(config: &LlmConfig, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: model.to_string(),
            temperature: config.temperature,
        }
    }

    /// Answer-generation model.
    pub fn generator(config: &LlmConfig) -> Self {
        Self::new(config, &config.model)
    }

    /// Cheaper model used for query rewriting.
    pub fn rewriter(config: &LlmConfig) -> Self {
        Self::new(config, &config.fast_model)
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
            temperature: prompt.temperature.unwrap_or(self.temperature),
            response_format: prompt.json.then_some(ResponseFormat { kind: "json_object" }),
        };
        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req
            .send()
            .await
            .map_err(|e| Error::GenerationUnavailable(format!("HTTP error: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::GenerationUnavailable(format!("API returned {status}: {text}")));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationUnavailable(format!("JSON parse error: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::GenerationUnavailable("empty completion".into()))?;
        debug!(model = %self.model, chars = content.len(), json = prompt.json, "completion received");
        Ok(content)
    }
}
