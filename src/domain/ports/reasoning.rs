/// The LLM reasoning backend behind the decision engine. Takes a rendered
/// prompt and returns the raw response text; the engine owns parsing,
/// validation and retries. Any error here is a transport-class failure
/// (timeout, rate limit, 5xx) and is retryable.
#[async_trait::async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, String>;

    /// Model/version string used in idempotency keys and cache fingerprints.
    fn fingerprint(&self) -> String;
}
