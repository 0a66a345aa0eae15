use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::entities::observation::Observation;
use crate::domain::ports::source::{SourceAdapter, SourceBatch, SourceError};
use crate::domain::values::source_kind::SourceKind;

/// News feed adapter for JSON feeds of the shape
/// `{"items": [{"title", "summary", "published", "symbol"?}]}`.
/// Items older than the cursor or addressed to other symbols are filtered;
/// unparsable items are counted and skipped, never retried.
pub struct NewsFeedSource {
    feed_url: String,
    client: reqwest::Client,
}

impl NewsFeedSource {
    pub fn new(feed_url: String) -> Self {
        Self {
            feed_url,
            client: reqwest::Client::builder()
                .user_agent("signalpipe/0.1")
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct FeedResponse {
    items: Vec<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct FeedItem {
    title: String,
    #[serde(default)]
    summary: Option<String>,
    published: String,
    #[serde(default)]
    symbol: Option<String>,
}

#[async_trait]
impl SourceAdapter for NewsFeedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    fn name(&self) -> &str {
        "news_feed"
    }

    async fn fetch(&self, symbol: &str, since: DateTime<Utc>) -> Result<SourceBatch, SourceError> {
        let url = format!("{}?symbol={symbol}", self.feed_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "feed returned {}",
                resp.status()
            )));
        }

        let data: FeedResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let mut batch = SourceBatch::default();
        for raw in data.items {
            let item: FeedItem = match serde_json::from_value(raw) {
                Ok(item) => item,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed feed item");
                    batch.malformed += 1;
                    continue;
                }
            };
            let published = match DateTime::parse_from_rfc3339(&item.published) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(_) => {
                    batch.malformed += 1;
                    continue;
                }
            };
            if published < since {
                continue;
            }
            if let Some(item_symbol) = &item.symbol {
                if !item_symbol.eq_ignore_ascii_case(symbol) {
                    continue;
                }
            }

            let raw_text = match &item.summary {
                Some(summary) if !summary.is_empty() => format!("{}. {}", item.title, summary),
                _ => item.title.clone(),
            };
            batch.observations.push(Observation::new(
                SourceKind::Feed,
                symbol.to_string(),
                published,
                raw_text,
                None,
            ));
        }

        Ok(batch)
    }
}
