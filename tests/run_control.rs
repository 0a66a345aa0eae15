mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    hours_ago, obs, pipe, test_config, CollectingNotifier, ScriptedBackend, ScriptedSource,
};
use signalpipe::application::orchestrator::CancelHandle;
use signalpipe::config::PipelineConfig;
use signalpipe::domain::entities::decision::Decision;
use signalpipe::domain::entities::run::RunStatus;
use signalpipe::domain::ports::notifier::Notifier;
use signalpipe::domain::ports::source::SourceAdapter;
use signalpipe::infrastructure::embeddings::hashing::HashingEmbedder;
use signalpipe::SignalPipe;

#[tokio::test]
async fn next_run_resumes_from_the_completed_cursor() {
    let newest = hours_ago(1);
    let source = Arc::new(ScriptedSource::new(vec![
        obs("ABC", "ABC $10.00 (+3.2%)", hours_ago(5)),
        obs("ABC", "ABC upgraded to overweight", newest),
    ]));
    let backend = Arc::new(ScriptedBackend::answering("BUY", 0.9));
    let notifier = Arc::new(CollectingNotifier::default());
    let pipe = pipe(source.clone(), backend, notifier);

    let first = pipe.run(&["ABC".into()]).await.unwrap();
    assert_eq!(first.cursor, Some(newest));

    pipe.run(&["ABC".into()]).await.unwrap();

    let windows = source.fetch_since();
    assert_eq!(windows.len(), 2);
    // First run falls back to a bounded lookback window.
    assert!(windows[0] < newest);
    // Second run picks up exactly where the first one left off.
    assert_eq!(windows[1], newest);
}

#[tokio::test]
async fn cancelled_run_finishes_as_failed() {
    let source = Arc::new(ScriptedSource::new(vec![obs(
        "ABC",
        "ABC $10.00 (+3.2%)",
        hours_ago(1),
    )]));
    let backend = Arc::new(ScriptedBackend::answering("BUY", 0.9));
    let notifier = Arc::new(CollectingNotifier::default());
    let pipe = pipe(source, backend.clone(), notifier.clone());

    pipe.cancel_handle().cancel();
    let run = pipe.run(&["ABC".into(), "XYZ".into()]).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.report.decisions_emitted, 0);
    assert_eq!(backend.calls(), 0);
    assert_eq!(notifier.count(), 0);

    let runs = pipe.runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
}

/// Notifier that records deliveries and, while armed, cancels the run after
/// each delivery.
#[derive(Default)]
struct CancelOnDelivery {
    sent: std::sync::Mutex<Vec<Decision>>,
    handle: std::sync::Mutex<Option<CancelHandle>>,
}

impl CancelOnDelivery {
    fn arm(&self, handle: CancelHandle) {
        *self.handle.lock().unwrap() = Some(handle);
    }

    fn disarm(&self) {
        *self.handle.lock().unwrap() = None;
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn symbols(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.symbol.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for CancelOnDelivery {
    fn name(&self) -> &str {
        "cancel_on_delivery"
    }

    async fn notify(&self, decision: &Decision) -> Result<(), String> {
        self.sent.lock().unwrap().push(decision.clone());
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.cancel();
        }
        Ok(())
    }
}

#[tokio::test]
async fn interrupted_run_resumes_without_re_emitting() {
    let source = Arc::new(ScriptedSource::new(vec![
        obs("ABC", "ABC reports strong earnings beat", hours_ago(2)),
        obs("XYZ", "XYZ guidance raised after record quarter", hours_ago(1)),
    ]));
    let backend = Arc::new(ScriptedBackend::answering("BUY", 0.9));
    let notifier = Arc::new(CancelOnDelivery::default());
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![source.clone()];
    let pipe = SignalPipe::with_providers(
        ":memory:",
        sources,
        Arc::new(HashingEmbedder),
        backend.clone(),
        notifier.clone(),
        test_config(),
    )
    .unwrap();
    notifier.arm(pipe.cancel_handle());

    // The run dies right after delivering ABC; XYZ never starts.
    let first = pipe
        .run(&["ABC".into(), "XYZ".into()])
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::Failed);
    assert_eq!(first.report.decisions_emitted, 1);
    assert_eq!(notifier.symbols(), vec!["ABC".to_string()]);
    assert_eq!(backend.calls(), 1);

    // The resumed run replays ABC into the cache and only XYZ is a fresh
    // emission; ABC is never delivered twice.
    notifier.disarm();
    let second = pipe
        .run(&["ABC".into(), "XYZ".into()])
        .await
        .unwrap();
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.report.cache_hits, 1);
    assert_eq!(second.report.decisions_emitted, 1);
    assert_eq!(backend.calls(), 2);
    assert_eq!(notifier.count(), 2);
    assert_eq!(notifier.symbols(), vec!["ABC".to_string(), "XYZ".to_string()]);
    assert_eq!(pipe.decisions(Some("ABC"), 10).unwrap().len(), 1);
    assert_eq!(pipe.decisions(Some("XYZ"), 10).unwrap().len(), 1);
}

#[tokio::test]
async fn first_run_lookback_is_configurable() {
    let source = Arc::new(ScriptedSource::new(vec![]));
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![source.clone()];
    let pipe = SignalPipe::with_providers(
        ":memory:",
        sources,
        Arc::new(HashingEmbedder),
        Arc::new(ScriptedBackend::answering("BUY", 0.9)),
        Arc::new(CollectingNotifier::default()),
        PipelineConfig {
            lookback: chrono::Duration::hours(3),
            ..test_config()
        },
    )
    .unwrap();

    pipe.run(&["ABC".into()]).await.unwrap();

    let windows = source.fetch_since();
    assert_eq!(windows.len(), 1);
    let expected = Utc::now() - chrono::Duration::hours(3);
    assert!((windows[0] - expected).num_seconds().abs() < 60);
}

#[tokio::test]
async fn transient_source_outage_is_retried() {
    let source = Arc::new(
        ScriptedSource::new(vec![obs("ABC", "ABC $10.00 (+3.2%)", hours_ago(1))])
            .failing_first(1),
    );
    let backend = Arc::new(ScriptedBackend::answering("BUY", 0.9));
    let notifier = Arc::new(CollectingNotifier::default());
    let pipe = pipe(source.clone(), backend, notifier.clone());

    let run = pipe.run(&["ABC".into()]).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.report.decisions_emitted, 1);
    assert_eq!(source.fetch_since().len(), 2);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn persistent_source_outage_skips_the_symbol() {
    let source = Arc::new(
        ScriptedSource::new(vec![obs("ABC", "ABC $10.00 (+3.2%)", hours_ago(1))])
            .failing_first(10),
    );
    let backend = Arc::new(ScriptedBackend::answering("BUY", 0.9));
    let notifier = Arc::new(CollectingNotifier::default());
    let pipe = pipe(source, backend.clone(), notifier.clone());

    let run = pipe.run(&["ABC".into()]).await.unwrap();

    // The run itself still completes; the outage is accounted, not fatal.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.report.decisions_emitted, 0);
    assert!(run.report.items_skipped >= 1);
    assert_eq!(backend.calls(), 0);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn malformed_payload_is_skipped_without_retry() {
    let source = Arc::new(ScriptedSource::malformed());
    let backend = Arc::new(ScriptedBackend::answering("BUY", 0.9));
    let notifier = Arc::new(CollectingNotifier::default());
    let pipe = pipe(source.clone(), backend, notifier);

    let run = pipe.run(&["ABC".into()]).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.report.items_skipped >= 1);
    // One fetch only: malformed is permanent for the window.
    assert_eq!(source.fetch_since().len(), 1);
}
