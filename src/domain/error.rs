use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Embedding backend failure. Transient; decisions degrade to an empty context.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Reasoning backend exhausted its retry budget. The symbol is skipped this run.
    #[error("Decision unavailable: {0}")]
    DecisionUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<String> for PipelineError {
    fn from(s: String) -> Self {
        PipelineError::Database(s)
    }
}

impl From<&str> for PipelineError {
    fn from(s: &str) -> Self {
        PipelineError::InvalidInput(s.to_string())
    }
}
