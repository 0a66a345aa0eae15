use crate::domain::entities::decision::Decision;
use crate::domain::ports::notifier::Notifier;

/// Notifier that writes delivered decisions to the log. The default when no
/// delivery channel is configured; also useful for dry runs.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, decision: &Decision) -> Result<(), String> {
        tracing::info!(
            symbol = %decision.symbol,
            signal = %decision.signal,
            confidence = %decision.confidence,
            rationale = %decision.rationale_text,
            "decision delivered"
        );
        Ok(())
    }
}
