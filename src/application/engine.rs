use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::context::ContextWindow;
use crate::config::PipelineConfig;
use crate::domain::entities::decision::{Decision, DecisionPayload};
use crate::domain::entities::observation::Observation;
use crate::domain::error::PipelineError;
use crate::domain::ports::decision_repository::{DecisionRepository, SaveOutcome};
use crate::domain::ports::reasoning::ReasoningBackend;
use crate::domain::values::fingerprint::{idempotency_key, request_fingerprint};
use crate::domain::values::retry::with_retries;

/// A produced decision plus how it was produced, for run accounting.
/// `newly_saved` is false for cache hits and for replays whose idempotency
/// key was already delivered; only a newly saved decision may be notified.
#[derive(Debug)]
pub struct EngineOutcome {
    pub decision: Decision,
    pub cache_hit: bool,
    pub backend_calls: usize,
    pub newly_saved: bool,
}

/// Invokes the reasoning backend and turns its output into validated
/// decisions. Owns the cost controls: the fingerprint cache (backed by the
/// decision store) and a per-fingerprint lock so concurrent workers never
/// issue duplicate backend calls for the same inputs.
pub struct DecisionEngine {
    backend: Arc<dyn ReasoningBackend>,
    decisions: Arc<dyn DecisionRepository>,
    config: PipelineConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DecisionEngine {
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        decisions: Arc<dyn DecisionRepository>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            backend,
            decisions,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Decide on one symbol given its current observations and retrieved
    /// context, and persist the result. Schema-invalid responses are re-asked
    /// with a corrective instruction up to the configured ceiling, then
    /// collapse to a terminal ABSTAIN decision. Transport failures exhaust
    /// the backoff budget and surface as `DecisionUnavailable`.
    pub async fn decide(
        &self,
        run_id: &str,
        symbol: &str,
        observations: &[Observation],
        context: &ContextWindow,
    ) -> Result<EngineOutcome, PipelineError> {
        let model = self.backend.fingerprint();
        let obs_ids: Vec<String> = observations.iter().map(|o| o.id.clone()).collect();
        let ctx_ids = context.ids();
        let fingerprint = request_fingerprint(symbol, &obs_ids, &ctx_ids, &model);
        let idem_key = idempotency_key(symbol, &obs_ids, &model);

        // Serialize on this fingerprint: at most one live backend invocation
        // per fingerprint. The winner persists its decision before releasing
        // the gate, so waiters always resolve from the cache.
        let gate = {
            let mut locks = self.locks.lock().await;
            locks.entry(fingerprint.clone()).or_default().clone()
        };
        let outcome = {
            let _guard = gate.lock().await;
            self.decide_guarded(run_id, symbol, observations, context, &model, &idem_key, &fingerprint)
                .await
        };

        // Shed the map entry once nobody else holds it, so fingerprints
        // do not accumulate across runs.
        let mut locks = self.locks.lock().await;
        if locks
            .get(&fingerprint)
            .map_or(false, |g| Arc::strong_count(g) == 2)
        {
            locks.remove(&fingerprint);
        }
        drop(locks);

        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn decide_guarded(
        &self,
        run_id: &str,
        symbol: &str,
        observations: &[Observation],
        context: &ContextWindow,
        model: &str,
        idem_key: &str,
        fingerprint: &str,
    ) -> Result<EngineOutcome, PipelineError> {
        if let Some(cached) = self.decisions.find_cached(fingerprint, self.config.cache_ttl)? {
            tracing::debug!(symbol, fingerprint = %&fingerprint[..12], "decision cache hit");
            return Ok(EngineOutcome {
                decision: cached,
                cache_hit: true,
                backend_calls: 0,
                newly_saved: false,
            });
        }

        let base_prompt = build_prompt(symbol, observations, context);
        let mut prompt = base_prompt.clone();
        let mut backend_calls = 0usize;
        let mut last_failure = String::new();

        for attempt in 0..=self.config.validation_retries {
            let raw = with_retries(&self.config.retry, || {
                backend_calls += 1;
                let p = prompt.clone();
                let backend = self.backend.clone();
                async move { backend.complete(&p).await }
            })
            .await
            .map_err(PipelineError::DecisionUnavailable)?;

            match parse_payload(&raw).and_then(|p| p.validate()) {
                Ok((signal, confidence, rationale)) => {
                    let decision = Decision::new(
                        run_id.to_string(),
                        symbol.to_string(),
                        signal,
                        confidence,
                        rationale,
                        model.to_string(),
                        idem_key.to_string(),
                        fingerprint.to_string(),
                    );
                    return self.persist(decision, observations, backend_calls);
                }
                Err(e) => {
                    tracing::warn!(symbol, attempt, error = %e, "backend response failed schema validation");
                    last_failure = e;
                    prompt = format!(
                        "{base_prompt}\n\nYour previous response was invalid: {last_failure}. \
                         Respond with ONLY a JSON object of the form \
                         {{\"signal\": \"BUY|SELL|HOLD|ABSTAIN\", \"confidence\": 0.0-1.0, \"rationale\": \"...\"}}."
                    );
                }
            }
        }

        // Terminal, non-fatal: record the abstention with what went wrong.
        let decision = Decision::abstained(
            run_id.to_string(),
            symbol.to_string(),
            format!("schema validation failed after retries: {last_failure}"),
            model.to_string(),
            idem_key.to_string(),
            fingerprint.to_string(),
        );
        self.persist(decision, observations, backend_calls)
    }

    fn persist(
        &self,
        decision: Decision,
        provenance: &[Observation],
        backend_calls: usize,
    ) -> Result<EngineOutcome, PipelineError> {
        match self.decisions.save(&decision, provenance)? {
            SaveOutcome::Saved(saved) => Ok(EngineOutcome {
                decision: saved,
                cache_hit: false,
                backend_calls,
                newly_saved: true,
            }),
            SaveOutcome::AlreadyDelivered(existing) => Ok(EngineOutcome {
                decision: existing,
                cache_hit: false,
                backend_calls,
                newly_saved: false,
            }),
        }
    }
}

fn build_prompt(symbol: &str, observations: &[Observation], context: &ContextWindow) -> String {
    let mut sections = Vec::new();
    sections.push(format!(
        "You are a trading-signal analyst. Decide a signal for {symbol} from the \
         observations below. Respond with ONLY a JSON object: \
         {{\"signal\": \"BUY|SELL|HOLD|ABSTAIN\", \"confidence\": 0.0-1.0, \"rationale\": \"...\"}}."
    ));

    sections.push("CURRENT OBSERVATIONS:".to_string());
    for obs in observations {
        let sentiment = obs
            .sentiment
            .map(|s| format!(" [sentiment {:+.2} @ {:.2}]", s.polarity, s.confidence))
            .unwrap_or_default();
        sections.push(format!(
            "- [{}] {} {}{}",
            obs.source_kind,
            obs.timestamp.to_rfc3339(),
            obs.raw_text,
            sentiment
        ));
    }

    if !context.is_empty() {
        sections.push("HISTORICAL CONTEXT (most similar first):".to_string());
        for item in &context.items {
            sections.push(format!("- ({:.2}) {}", item.score, item.text));
        }
    }

    sections.join("\n")
}

/// Parse the backend's raw response as a decision payload. Tolerates prose
/// around the JSON object; the corrective retry handles everything else.
fn parse_payload(raw: &str) -> Result<DecisionPayload, String> {
    let trimmed = raw.trim();
    if let Ok(payload) = serde_json::from_str::<DecisionPayload>(trimmed) {
        return Ok(payload);
    }
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            return serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| format!("response is not a decision object: {e}"));
        }
    }
    Err("response contains no JSON object".to_string())
}
