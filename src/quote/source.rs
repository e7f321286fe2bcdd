//! Quote Source Adapter.
//!
//! Wraps the upstream quote provider behind a trait so the engine never
//! depends on the concrete HTTP client. The provider itself (its exact query
//! shapes, auth, and rate limits) is an external collaborator; this module
//! only commits to the three-strategy fallback policy the engine relies on.

use async_trait::async_trait;
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::models::Bar;

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Returns the most recent bar for `ticker`, or `None` if the provider has
    /// nothing usable. Network/provider failures surface as `Err`; callers
    /// that only care about "is there a fresh quote" should treat both `Ok(None)`
    /// and `Err` as "no update" and fall back to the cache.
    async fn snapshot(&self, ticker: &str) -> Result<Option<Bar>, AdapterError>;

    /// Returns up to `days` of 1-minute bars for `ticker`, each with its own
    /// timestamp, for historical backfill. Test doubles that never exercise
    /// backfill can rely on the default empty implementation.
    async fn history(&self, _ticker: &str, _days: u32) -> Result<Vec<(chrono::DateTime<chrono::Utc>, Bar)>, AdapterError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    close: Decimal,
    high: Decimal,
    low: Decimal,
    #[serde(default)]
    volume: u64,
    #[serde(default)]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Default)]
struct InfoResponse {
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    #[serde(rename = "currentPrice")]
    current_price: Option<Decimal>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<Decimal>,
    #[serde(rename = "averageVolume10days")]
    average_volume_10_days: Option<u64>,
}

/// HTTP-backed adapter. Tries, in order: 1 trading day at 1-minute resolution,
/// then 5 trading days at 5-minute resolution, then a snapshot-info call.
pub struct HttpQuoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuoteSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("quote-engine/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_bars(&self, ticker: &str, period: &str, interval: &str) -> Option<Vec<RawBar>> {
        let url = format!("{}/bars", self.base_url);
        let result = self
            .client
            .get(&url)
            .query(&[("ticker", ticker), ("period", period), ("interval", interval)])
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(ticker, %e, "bars request failed");
                return None;
            }
        };

        match response.json::<BarsResponse>().await {
            Ok(parsed) if !parsed.bars.is_empty() => Some(parsed.bars),
            Ok(_) => None,
            Err(e) => {
                debug!(ticker, %e, "failed to parse bars response");
                None
            }
        }
    }

    async fn fetch_info(&self, ticker: &str) -> Option<InfoResponse> {
        let url = format!("{}/info", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("ticker", ticker)])
            .send()
            .await
            .ok()?;
        response.json::<InfoResponse>().await.ok()
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn snapshot(&self, ticker: &str) -> Result<Option<Bar>, AdapterError> {
        if let Some(bars) = self.fetch_bars(ticker, "1d", "1m").await {
            return Ok(Some(aggregate_day(&bars)));
        }

        if let Some(bars) = self.fetch_bars(ticker, "5d", "5m").await {
            return Ok(Some(aggregate_day(&bars)));
        }

        if let Some(info) = self.fetch_info(ticker).await {
            if let Some(bar) = bar_from_info(&info) {
                return Ok(Some(bar));
            }
        }

        warn!(ticker, "upstream has no usable quote data");
        Ok(None)
    }

    async fn history(&self, ticker: &str, days: u32) -> Result<Vec<(chrono::DateTime<chrono::Utc>, Bar)>, AdapterError> {
        let period = format!("{days}d");
        let bars = match self.fetch_bars(ticker, &period, "1m").await {
            Some(bars) => bars,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::with_capacity(bars.len());
        let now = chrono::Utc::now();
        for (i, bar) in bars.iter().enumerate() {
            let ts = bar.timestamp.unwrap_or(now - chrono::Duration::minutes((bars.len() - i) as i64));
            out.push((
                ts,
                Bar {
                    close: bar.close,
                    day_high: bar.high,
                    day_low: bar.low,
                    volume: bar.volume,
                },
            ));
        }
        Ok(out)
    }
}

/// Aggregates a day's bars into one observation: last bar's close/high/low,
/// sum of volume across all returned bars.
fn aggregate_day(bars: &[RawBar]) -> Bar {
    let last = bars.last().expect("caller checked non-empty");
    let volume: u64 = bars.iter().map(|b| b.volume).sum();
    Bar {
        close: last.close,
        day_high: last.high,
        day_low: last.low,
        volume,
    }
}

/// Derives a bar from a snapshot-info response when no bars are available.
/// Day-high/day-low are approximated as `mid ± 1%`; volume falls back to the
/// 10-day average (or 0).
fn bar_from_info(info: &InfoResponse) -> Option<Bar> {
    let mid = if let (Some(bid), Some(ask)) = (info.bid, info.ask) {
        (bid + ask) / Decimal::TWO
    } else if let Some(p) = info.current_price {
        p
    } else if let Some(p) = info.regular_market_price {
        p
    } else {
        return None;
    };

    let one_pct = mid * Decimal::new(1, 2);
    Some(Bar {
        close: mid,
        day_high: mid + one_pct,
        day_low: mid - one_pct,
        volume: info.average_volume_10_days.unwrap_or(0),
    })
}
