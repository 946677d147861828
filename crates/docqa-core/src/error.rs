use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Index backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Relevance scoring unavailable: {0}")]
    ScoringUnavailable(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Index operation failed: {0}")]
    Index(String),
}

impl Error {
    /// Transient dependency failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_)
                | Self::EmbeddingUnavailable(_)
                | Self::ScoringUnavailable(_)
                | Self::GenerationUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
