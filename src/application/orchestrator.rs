use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use crate::application::context::ContextBuilder;
use crate::application::engine::DecisionEngine;
use crate::application::sentiment;
use crate::config::PipelineConfig;
use crate::domain::entities::observation::Observation;
use crate::domain::entities::run::{Run, RunReport, RunStatus};
use crate::domain::error::PipelineError;
use crate::domain::ports::embedding::{EmbeddingProvider, InputType};
use crate::domain::ports::notifier::Notifier;
use crate::domain::ports::observation_repository::{ObservationFilter, ObservationRepository};
use crate::domain::ports::run_repository::RunRepository;
use crate::domain::ports::source::{SourceAdapter, SourceError};
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::signal::Signal;

/// Cancellation handle for an in-flight run. Cancelling lets in-flight
/// symbol work finish (no partial writes) and marks the run FAILED.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives one run: fetch -> score -> embed/retrieve -> decide -> persist ->
/// notify, per symbol, with bounded parallelism across symbols.
pub struct Orchestrator {
    sources: Vec<Arc<dyn SourceAdapter>>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    context_builder: Arc<ContextBuilder>,
    engine: Arc<DecisionEngine>,
    observations: Arc<dyn ObservationRepository>,
    runs: Arc<dyn RunRepository>,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
    cancel: watch::Receiver<bool>,
    cancel_tx: watch::Sender<bool>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<Arc<dyn SourceAdapter>>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        context_builder: Arc<ContextBuilder>,
        engine: Arc<DecisionEngine>,
        observations: Arc<dyn ObservationRepository>,
        runs: Arc<dyn RunRepository>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        let (cancel_tx, cancel) = watch::channel(false);
        Self {
            sources,
            embedder,
            vector_store,
            context_builder,
            engine,
            observations,
            runs,
            notifier,
            config,
            cancel,
            cancel_tx,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Execute one run over `symbols`. Store unavailability at start is the
    /// only fatal error; per-symbol failures are logged, counted, and
    /// skipped. Returns the finished run (COMPLETED or FAILED on cancel).
    pub async fn run(self: Arc<Self>, symbols: &[String]) -> Result<Run, PipelineError> {
        let mut run = Run::start();
        // Fatal if the store is down: the run cannot even be recorded.
        self.runs.create(&run)?;

        let since = self
            .runs
            .last_completed_cursor()?
            .unwrap_or_else(|| run.started_at - self.config.lookback);

        info!(run_id = %run.id, symbols = symbols.len(), since = %since.to_rfc3339(), "run started");

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut tasks = Vec::new();
        let mut cancelled = false;

        for symbol in symbols {
            if *self.cancel.borrow() {
                cancelled = true;
                warn!(run_id = %run.id, symbol, "cancellation requested, skipping remaining symbols");
                break;
            }

            let orchestrator = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let run_id = run.id.clone();
            let symbol = symbol.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                // A task that has not started yet is not in-flight: queued
                // symbols stop here when the run is cancelled.
                if *orchestrator.cancel.borrow() {
                    return (RunReport::default(), None);
                }
                orchestrator.process_symbol(&run_id, &symbol, since).await
            }));
        }

        let mut report = RunReport::default();
        let mut high_water = since;
        for task in tasks {
            match task.await {
                Ok((symbol_report, cursor)) => {
                    report.merge(&symbol_report);
                    if let Some(ts) = cursor {
                        high_water = high_water.max(ts);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "symbol worker panicked");
                    report.items_skipped += 1;
                }
            }
        }

        // In-flight work has completed by here, so finishing the run cannot
        // race a partial write.
        cancelled = cancelled || *self.cancel.borrow();
        let status = if cancelled {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.runs.finish(&run.id, status, Some(high_water), &report)?;
        if cancelled {
            // The handle only ever aims at one run; clear the flag so the
            // next run starts live.
            self.cancel_tx.send_replace(false);
        }

        run.status = status;
        run.completed_at = Some(Utc::now());
        run.cursor = Some(high_water);
        run.report = report;

        info!(
            run_id = %run.id,
            status = %status,
            observations = report.observations_processed,
            emitted = report.decisions_emitted,
            abstained = report.decisions_abstained,
            skipped = report.items_skipped,
            cache_hits = report.cache_hits,
            "run finished"
        );
        Ok(run)
    }

    /// All stages for one symbol, strictly sequential. Returns this symbol's
    /// report slice and the newest observation timestamp seen.
    async fn process_symbol(
        &self,
        run_id: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> (RunReport, Option<DateTime<Utc>>) {
        let mut report = RunReport::default();

        let fetched = self.ingest(symbol, since, &mut report).await;
        if fetched.is_empty() {
            return (report, None);
        }
        let high_water = fetched.iter().map(|o| o.timestamp).max();

        // Score + persist each fetched observation; store failures skip the
        // item.
        for obs in fetched {
            let score = sentiment::score(&obs.raw_text);
            let scored = obs.with_sentiment(score);
            match self.observations.record(&scored) {
                Ok(_new) => report.observations_processed += 1,
                Err(e) => {
                    warn!(symbol, error = %e, "failed to record observation, skipping");
                    report.items_skipped += 1;
                }
            }
        }

        // Decide over everything persisted for this symbol inside the
        // lookback window, not just this fetch. A replayed or partially
        // re-fetched window then collapses to the same input set, the same
        // idempotency key, and the same request fingerprint.
        let window_start = Utc::now() - self.config.lookback;
        let mut batch = match self.observations.query(&ObservationFilter {
            symbol: Some(symbol.to_string()),
            since: Some(window_start),
            ..Default::default()
        }) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(symbol, error = %e, "failed to load decision inputs, skipping symbol");
                report.items_skipped += 1;
                return (report, high_water);
            }
        };
        if batch.is_empty() {
            return (report, high_water);
        }
        batch.sort_by_key(|o| o.timestamp);

        let context = self.embed_and_retrieve(symbol, &batch).await;

        let outcome = match self.engine.decide(run_id, symbol, &batch, &context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // DecisionUnavailable or a failed persist: skip this symbol
                // this run.
                warn!(symbol, error = %e, "decision unavailable, skipping symbol");
                report.items_skipped += 1;
                return (report, high_water);
            }
        };
        report.backend_calls += outcome.backend_calls;
        if outcome.cache_hit {
            report.cache_hits += 1;
        } else if !outcome.newly_saved {
            info!(symbol, key = %&outcome.decision.idempotency_key[..12], "decision already delivered, not re-notifying");
        }

        // Emit counters and notification only for a decision the store
        // actually accepted as new.
        if outcome.newly_saved {
            let decision = outcome.decision;
            if decision.signal == Signal::Abstain {
                report.decisions_abstained += 1;
            } else {
                report.decisions_emitted += 1;
                if decision.confidence.clears(self.config.confidence_threshold) {
                    // Single attempt; a notify failure never un-persists or
                    // retries.
                    match self.notifier.notify(&decision).await {
                        Ok(()) => report.notifications_sent += 1,
                        Err(e) => {
                            warn!(symbol, notifier = self.notifier.name(), error = %e, "notification failed")
                        }
                    }
                }
            }
        }

        (report, high_water)
    }

    /// Pull observations for one symbol from every adapter. Transport
    /// failures are retried with backoff; a malformed payload skips that
    /// adapter's window without retry.
    async fn ingest(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        report: &mut RunReport,
    ) -> Vec<Observation> {
        let mut all = Vec::new();
        for source in &self.sources {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match source.fetch(symbol, since).await {
                    Ok(batch) => {
                        report.items_skipped += batch.malformed;
                        all.extend(batch.observations);
                        break;
                    }
                    Err(SourceError::Malformed(e)) => {
                        warn!(symbol, source = source.name(), error = %e, "malformed source payload, skipping");
                        report.items_skipped += 1;
                        break;
                    }
                    Err(SourceError::Unavailable(e)) if attempt < self.config.retry.max_attempts => {
                        let delay = self.config.retry.delay_for(attempt);
                        warn!(symbol, source = source.name(), attempt, error = %e, "source unavailable, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    Err(SourceError::Unavailable(e)) => {
                        warn!(symbol, source = source.name(), error = %e, "source unavailable, giving up this run");
                        report.items_skipped += 1;
                        break;
                    }
                }
            }
        }
        all
    }

    /// Embed the batch, upsert vectors, and retrieve historical context.
    /// Embedding unavailability degrades to an empty window.
    async fn embed_and_retrieve(
        &self,
        symbol: &str,
        batch: &[Observation],
    ) -> crate::application::context::ContextWindow {
        let texts: Vec<String> = batch.iter().map(|o| o.embeddable_text()).collect();
        let model = self.embedder.fingerprint();

        let vectors = match self.embedder.embed(&texts, InputType::Document).await {
            Ok(v) => v,
            Err(e) => {
                warn!(symbol, error = %e, "embedding unavailable, deciding with empty context");
                return crate::application::context::ContextWindow::empty();
            }
        };

        let current_ids: HashSet<String> = batch.iter().map(|o| o.id.clone()).collect();
        for (obs, vector) in batch.iter().zip(vectors.iter()) {
            if vector.is_empty() {
                continue;
            }
            if let Err(e) = self.vector_store.upsert(&obs.id, vector, &model) {
                warn!(symbol, error = %e, "vector upsert failed");
            }
        }

        // Representative query: the symbol plus its newest raw texts.
        let query_text = std::iter::once(symbol.to_string())
            .chain(batch.iter().rev().take(3).map(|o| o.raw_text.clone()))
            .collect::<Vec<_>>()
            .join(" ");
        let query_vector = match self
            .embedder
            .embed(&[query_text], InputType::Query)
            .await
        {
            Ok(mut v) if !v.is_empty() => v.remove(0),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(symbol, error = %e, "query embedding unavailable, deciding with empty context");
                Vec::new()
            }
        };

        self.context_builder.build(&query_vector, &current_ids)
    }
}
