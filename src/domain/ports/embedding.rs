#[derive(Debug, Clone, Copy)]
pub enum InputType {
    Document,
    Query,
}

/// Embedding backend. Deterministic for a fixed `fingerprint`; failures are
/// transient and callers degrade to an empty context window.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>, String>;

    fn dimension(&self) -> usize;

    /// Model/version string; part of every cache key so a model swap
    /// invalidates stored vectors and cached decisions.
    fn fingerprint(&self) -> String;
}
