//! Historical Backfill: a one-shot, idempotent bulk loader run once at
//! startup for a small symbol whitelist, gated by the persisted watermark.

use std::sync::Arc;

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use tracing::{info, warn};

use crate::db::Db;
use crate::models::Quote;
use crate::quote::QuoteSource;
use crate::registry::Registry;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillReport {
    pub symbols_attempted: usize,
    pub symbols_failed: usize,
    pub rows_inserted: usize,
}

/// Fetches `days` of 1-minute history for each symbol in `symbols`, synthesizes
/// bid/ask the same way the live path does, and bulk-inserts with
/// conflict-skip. A per-symbol failure is logged and does not abort the run.
pub async fn run_backfill(
    registry: &Registry,
    source: Arc<dyn QuoteSource>,
    db: &Db,
    symbols: &[String],
    days: u32,
) -> anyhow::Result<BackfillReport> {
    let mut report = BackfillReport::default();

    for symbol in symbols {
        report.symbols_attempted += 1;
        let instrument = match registry.get(symbol) {
            Ok(i) => i,
            Err(e) => {
                warn!(symbol, error = %e, "backfill skipping unregistered symbol");
                report.symbols_failed += 1;
                continue;
            }
        };

        let history = match source.history(&instrument.upstream_ticker, days).await {
            Ok(h) => h,
            Err(e) => {
                warn!(symbol, error = %e, "backfill fetch failed");
                report.symbols_failed += 1;
                continue;
            }
        };

        if history.is_empty() {
            continue;
        }

        let half_spread = instrument.spread / Decimal::TWO;
        let quotes: Vec<Quote> = history
            .into_iter()
            .map(|(ts, bar)| Quote {
                symbol: symbol.clone(),
                bid: round(bar.close - half_spread, instrument.decimals),
                ask: round(bar.close + half_spread, instrument.decimals),
                day_high: round(bar.day_high, instrument.decimals),
                day_low: round(bar.day_low, instrument.decimals),
                volume: bar.volume,
                fetched_at: ts,
            })
            .collect();

        match db.insert_ticks_ignore_conflicts(&quotes).await {
            Ok(n) => {
                info!(symbol, rows = n, "backfill inserted rows");
                report.rows_inserted += n;
            }
            Err(e) => {
                warn!(symbol, error = %e, "backfill insert failed");
                report.symbols_failed += 1;
            }
        }
    }

    Ok(report)
}

fn round(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::models::Bar;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct FakeHistorySource {
        bars: Vec<(chrono::DateTime<Utc>, Bar)>,
    }

    #[async_trait]
    impl QuoteSource for FakeHistorySource {
        async fn snapshot(&self, _ticker: &str) -> Result<Option<Bar>, AdapterError> {
            Ok(None)
        }

        async fn history(&self, _ticker: &str, _days: u32) -> Result<Vec<(chrono::DateTime<Utc>, Bar)>, AdapterError> {
            Ok(self.bars.clone())
        }
    }

    #[tokio::test]
    async fn backfill_inserts_rows_and_is_idempotent() {
        let registry = Registry::load(None).unwrap();
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();

        let bars = vec![
            (Utc::now(), Bar { close: dec!(1.10000), day_high: dec!(1.11), day_low: dec!(1.09), volume: 10 }),
            (Utc::now(), Bar { close: dec!(1.10100), day_high: dec!(1.11), day_low: dec!(1.09), volume: 12 }),
        ];
        let source: Arc<dyn QuoteSource> = Arc::new(FakeHistorySource { bars });

        let first = run_backfill(&registry, source.clone(), &db, &["EURUSD".to_string()], 7).await.unwrap();
        assert_eq!(first.rows_inserted, 2);
        assert_eq!(first.symbols_failed, 0);

        let second = run_backfill(&registry, source, &db, &["EURUSD".to_string()], 7).await.unwrap();
        assert_eq!(second.rows_inserted, 0);
    }

    #[tokio::test]
    async fn unregistered_symbol_is_skipped_not_fatal() {
        let registry = Registry::load(None).unwrap();
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        let source: Arc<dyn QuoteSource> = Arc::new(FakeHistorySource { bars: vec![] });

        let report = run_backfill(&registry, source, &db, &["NOT_IN_THE_REGISTRY".to_string()], 7)
            .await
            .unwrap();
        assert_eq!(report.symbols_attempted, 1);
        assert_eq!(report.symbols_failed, 1);
    }
}
