use std::time::Duration;

use crate::domain::entities::decision::Decision;
use crate::domain::ports::notifier::Notifier;

/// Posts delivered decisions as JSON to a configured endpoint. One attempt
/// per decision; delivery failures are the caller's to log.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, decision: &Decision) -> Result<(), String> {
        let resp = self
            .client
            .post(&self.url)
            .json(decision)
            .send()
            .await
            .map_err(|e| format!("webhook error: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("webhook returned {}", resp.status()));
        }
        Ok(())
    }
}
