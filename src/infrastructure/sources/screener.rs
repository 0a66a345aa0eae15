use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::domain::entities::observation::Observation;
use crate::domain::ports::source::{SourceAdapter, SourceBatch, SourceError};
use crate::domain::values::source_kind::SourceKind;

/// Market screener snapshot adapter using the Yahoo v8 chart API (no auth).
/// One observation per symbol per provider tick; the provider's market
/// timestamp keys the content hash, so re-fetching the same tick collapses.
pub struct ScreenerSource {
    client: reqwest::Client,
    base_url: String,
}

impl ScreenerSource {
    pub fn new() -> Self {
        Self::with_base_url("https://query1.finance.yahoo.com".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                     AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/120.0.0.0 Safari/537.36",
                )
                .build()
                .unwrap_or_default(),
            base_url,
        }
    }

    fn batch_from_meta(meta: &ChartMeta, since: DateTime<Utc>) -> SourceBatch {
        let price = match meta.regular_market_price {
            Some(p) => p,
            // Quote without a price is a malformed item, not a dead source.
            None => {
                return SourceBatch {
                    observations: vec![],
                    malformed: 1,
                }
            }
        };

        let timestamp = match meta
            .regular_market_time
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
        {
            Some(ts) => ts,
            // Without the provider's market timestamp the observation has no
            // stable content hash; skip the item as malformed.
            None => {
                return SourceBatch {
                    observations: vec![],
                    malformed: 1,
                }
            }
        };
        if timestamp < since {
            return SourceBatch::default();
        }

        let prev_close = meta.chart_previous_close.unwrap_or(price);
        let change_pct = if prev_close > 0.0 {
            (price - prev_close) / prev_close * 100.0
        } else {
            0.0
        };

        let raw_text = format!("{} ${:.2} ({:+.2}%)", meta.symbol, price, change_pct);
        let observation = Observation::new(
            SourceKind::Screener,
            meta.symbol.clone(),
            timestamp,
            raw_text,
            Some(serde_json::json!({
                "price": price,
                "previous_close": prev_close,
                "change_pct": change_pct,
                "volume": meta.regular_market_volume,
            })),
        );

        SourceBatch::from_observations(vec![observation])
    }
}

impl Default for ScreenerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartData {
    meta: ChartMeta,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<u64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
}

#[async_trait]
impl SourceAdapter for ScreenerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Screener
    }

    fn name(&self) -> &str {
        "yahoo_screener"
    }

    async fn fetch(&self, symbol: &str, since: DateTime<Utc>) -> Result<SourceBatch, SourceError> {
        let url = format!(
            "{}/v8/finance/chart/{symbol}?range=1d&interval=1d",
            self.base_url
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "screener returned {} for {symbol}",
                resp.status()
            )));
        }

        let data: ChartResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        if let Some(err) = data.chart.error {
            return Err(SourceError::Malformed(format!("provider error: {err}")));
        }

        let meta = match data.chart.result.as_ref().and_then(|r| r.first()) {
            Some(d) => &d.meta,
            None => return Err(SourceError::Malformed("empty chart result".into())),
        };

        Ok(Self::batch_from_meta(meta, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(price: Option<f64>, time: Option<i64>) -> ChartMeta {
        ChartMeta {
            symbol: "ABC".into(),
            regular_market_price: price,
            chart_previous_close: Some(9.5),
            regular_market_volume: Some(120_000),
            regular_market_time: time,
        }
    }

    #[test]
    fn quote_without_provider_timestamp_counts_as_malformed() {
        let since = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let batch = ScreenerSource::batch_from_meta(&meta(Some(10.0), None), since);
        assert!(batch.observations.is_empty());
        assert_eq!(batch.malformed, 1);
    }

    #[test]
    fn quote_without_price_counts_as_malformed() {
        let since = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let batch = ScreenerSource::batch_from_meta(&meta(None, Some(1_700_000_500)), since);
        assert!(batch.observations.is_empty());
        assert_eq!(batch.malformed, 1);
    }

    #[test]
    fn refetching_the_same_tick_yields_the_same_id() {
        let since = Utc.timestamp_opt(1_699_990_000, 0).single().unwrap();
        let a = ScreenerSource::batch_from_meta(&meta(Some(10.0), Some(1_700_000_000)), since);
        let b = ScreenerSource::batch_from_meta(&meta(Some(10.0), Some(1_700_000_000)), since);
        assert_eq!(a.observations.len(), 1);
        assert_eq!(a.observations[0].id, b.observations[0].id);
    }

    #[test]
    fn tick_older_than_the_cursor_yields_an_empty_batch() {
        let since = Utc.timestamp_opt(1_700_000_500, 0).single().unwrap();
        let batch = ScreenerSource::batch_from_meta(&meta(Some(10.0), Some(1_700_000_000)), since);
        assert!(batch.observations.is_empty());
        assert_eq!(batch.malformed, 0);
    }
}
