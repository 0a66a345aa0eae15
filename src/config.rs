use std::time::Duration;

use crate::domain::values::retry::RetryPolicy;

/// Operational tuning for one pipeline. These are deployment knobs, not
/// structure; every field has an env override (`SIGNALPIPE_*`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Max context items retrieved per decision.
    pub top_k: usize,
    /// Minimum similarity score for a retrieved item.
    pub min_score: f64,
    /// Decisions below this confidence are persisted but not notified.
    pub confidence_threshold: f64,
    /// How long a cached decision for the same request fingerprint is live.
    pub cache_ttl: chrono::Duration,
    /// Corrective re-asks after a schema-invalid backend response.
    pub validation_retries: u32,
    /// Character budget of the assembled context window.
    pub context_char_budget: usize,
    /// Concurrent symbol workers.
    pub max_workers: usize,
    /// Fetch window for a first run with no completed cursor; also bounds
    /// the per-symbol decision input set.
    pub lookback: chrono::Duration,
    /// Backoff policy at the source/embedding/backend boundaries.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_score: 0.6,
            confidence_threshold: 0.65,
            cache_ttl: chrono::Duration::hours(24),
            validation_retries: 2,
            context_char_budget: 4000,
            max_workers: 4,
            lookback: chrono::Duration::days(7),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by any `SIGNALPIPE_*` env vars that parse.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<usize>("SIGNALPIPE_TOP_K") {
            cfg.top_k = v;
        }
        if let Some(v) = env_parse::<f64>("SIGNALPIPE_MIN_SCORE") {
            cfg.min_score = v;
        }
        if let Some(v) = env_parse::<f64>("SIGNALPIPE_CONFIDENCE_THRESHOLD") {
            cfg.confidence_threshold = v;
        }
        if let Some(v) = env_parse::<i64>("SIGNALPIPE_CACHE_TTL_HOURS") {
            cfg.cache_ttl = chrono::Duration::hours(v);
        }
        if let Some(v) = env_parse::<u32>("SIGNALPIPE_VALIDATION_RETRIES") {
            cfg.validation_retries = v;
        }
        if let Some(v) = env_parse::<usize>("SIGNALPIPE_CONTEXT_BUDGET") {
            cfg.context_char_budget = v;
        }
        if let Some(v) = env_parse::<usize>("SIGNALPIPE_MAX_WORKERS") {
            cfg.max_workers = v.max(1);
        }
        if let Some(v) = env_parse::<i64>("SIGNALPIPE_LOOKBACK_HOURS") {
            cfg.lookback = chrono::Duration::hours(v.max(1));
        }
        if let Some(v) = env_parse::<u32>("SIGNALPIPE_RETRY_ATTEMPTS") {
            cfg.retry.max_attempts = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("SIGNALPIPE_RETRY_BASE_MS") {
            cfg.retry.base_delay = Duration::from_millis(v);
        }
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
