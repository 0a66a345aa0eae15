use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

use crate::domain::entities::observation::Observation;
use crate::domain::ports::source::{SourceAdapter, SourceBatch, SourceError};
use crate::domain::values::source_kind::SourceKind;

/// Social sentiment adapter over Reddit's public search JSON. Posts become
/// observations; their creation time keys the content hash so overlapping
/// search windows collapse.
pub struct SocialSource {
    subreddit: String,
    client: reqwest::Client,
}

impl SocialSource {
    pub fn new(subreddit: String) -> Self {
        Self {
            subreddit,
            client: reqwest::Client::builder()
                .user_agent("signalpipe/0.1")
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, serde::Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, serde::Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, serde::Deserialize)]
struct PostData {
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
}

#[async_trait]
impl SourceAdapter for SocialSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    fn name(&self) -> &str {
        "reddit_social"
    }

    async fn fetch(&self, symbol: &str, since: DateTime<Utc>) -> Result<SourceBatch, SourceError> {
        let url = format!(
            "https://www.reddit.com/r/{}/search.json?q={symbol}&restrict_sr=1&sort=new&limit=25",
            self.subreddit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "reddit returned {}",
                resp.status()
            )));
        }

        let listing: Listing = resp
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let mut batch = SourceBatch::default();
        for child in listing.data.children {
            let post = child.data;
            let created = match Utc.timestamp_opt(post.created_utc as i64, 0).single() {
                Some(dt) => dt,
                None => {
                    batch.malformed += 1;
                    continue;
                }
            };
            if created < since {
                continue;
            }
            let raw_text = if post.selftext.is_empty() {
                post.title
            } else {
                // Self-posts can run long; keep the lead.
                let body: String = post.selftext.chars().take(500).collect();
                format!("{}. {}", post.title, body)
            };
            batch.observations.push(Observation::new(
                SourceKind::Social,
                symbol.to_string(),
                created,
                raw_text,
                None,
            ));
        }

        Ok(batch)
    }
}
