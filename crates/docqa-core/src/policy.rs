//! Per-call timeout and bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::CallsConfig;
use crate::error::{Error, Result};

/// Kind of external call, deciding retry budget and timeout mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    KeywordSearch,
    VectorSearch,
    Embed,
    Score,
    Generate,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::KeywordSearch => "keyword_search",
            Self::VectorSearch => "vector_search",
            Self::Embed => "embed",
            Self::Score => "score",
            Self::Generate => "generate",
        }
    }

    /// Idempotent reads may be retried with the read budget.
    pub fn is_read(self) -> bool {
        !matches!(self, Self::Generate)
    }

    fn timed_out(self, after: Duration) -> Error {
        let msg = format!("{} timed out after {}ms", self.name(), after.as_millis());
        match self {
            Self::KeywordSearch | Self::VectorSearch => Error::BackendUnavailable(msg),
            Self::Embed => Error::EmbeddingUnavailable(msg),
            Self::Score => Error::ScoringUnavailable(msg),
            Self::Generate => Error::GenerationUnavailable(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub read_retries: u32,
    pub generation_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from(&CallsConfig::default())
    }
}

impl From<&CallsConfig> for CallPolicy {
    fn from(c: &CallsConfig) -> Self {
        Self {
            timeout: c.timeout(),
            read_retries: c.read_retries,
            generation_retries: c.generation_retries,
            initial_backoff: Duration::from_millis(c.backoff_ms),
            max_backoff: Duration::from_millis(c.max_backoff_ms),
        }
    }
}

impl CallPolicy {
    pub fn retries_for(&self, op: Operation) -> u32 {
        if op.is_read() { self.read_retries } else { self.generation_retries }
    }

    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `call` under the timeout, retrying retryable failures.
    ///
    /// A timeout is reported as the unavailability kind of `op`. Errors that
    /// are not retryable (e.g. `DimensionMismatch`) return immediately.
    pub async fn run<T, F, Fut>(&self, op: Operation, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retries = self.retries_for(op);
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(op.timed_out(self.timeout)),
            };
            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = op.name(), attempt, "external call recovered");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    let delay = self.backoff_for(attempt);
                    warn!(operation = op.name(), attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying external call");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
