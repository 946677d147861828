use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fusion::DEFAULT_RRF_K;

pub const CONFIG_FILE: &str = "docqa.toml";

/// Layered settings source.
///
/// Merges built-in defaults, `docqa.toml`, `docqa.<env>.toml` (env from
/// `RUST_ENV`, default `dev`) and `APP_*` environment variables, where `__`
/// separates nested keys (`APP_RETRIEVAL__TOP_K=20`).
pub struct Settings {
    figment: Figment,
}

impl Settings {
    /// Load from `APP_CONFIG_DIR` (with `~`/`$VAR` expansion) or the working directory.
    pub fn load() -> anyhow::Result<Self> {
        let dir = env::var("APP_CONFIG_DIR").map_or_else(|_| PathBuf::from("."), expand_path);
        Self::load_from(&dir)
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()))
            .merge(Toml::file(dir.join(CONFIG_FILE)));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("docqa.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("docqa.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("docqa.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full pipeline configuration.
    pub fn pipeline(&self) -> Result<PipelineConfig> {
        let config: PipelineConfig = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub enhance: EnhanceConfig,
    pub calls: CallsConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub scoring: ScoringConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be positive".into()));
        }
        if self.retrieval.rrf_k == 0 {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be positive".into()));
        }
        if self.rerank.top_n == 0 {
            return Err(Error::InvalidConfig("rerank.top_n must be positive".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.calls.timeout_ms == 0 {
            return Err(Error::InvalidConfig("calls.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub rrf_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 10, rrf_k: DEFAULT_RRF_K }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub top_n: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { enabled: true, top_n: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnhanceConfig {
    pub num_variants: usize,
    pub resolve_coreferences: bool,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self { num_variants: 2, resolve_coreferences: false }
    }
}

/// Timeout and retry budget for external calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CallsConfig {
    pub timeout_ms: u64,
    pub read_retries: u32,
    pub generation_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            read_retries: 2,
            generation_retries: 2,
            backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl CallsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Cheaper model used for query rewriting.
    pub fast_model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4".to_string(),
            fast_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderKind {
    #[default]
    Hashing,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub dim: usize,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            dim: 1024,
            base_url: "http://localhost:11434/v1".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringProviderKind {
    #[default]
    TermOverlap,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScoringConfig {
    pub provider: ScoringProviderKind,
    pub url: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            provider: ScoringProviderKind::TermOverlap,
            url: "http://localhost:2260/rerank".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
