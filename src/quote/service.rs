//! Quote Service: composes the Registry, the Quote Source Adapter, and the
//! Quote Cache into the one operation the rest of the engine calls.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use tracing::debug;

use crate::error::RegistryError;
use crate::models::Quote;
use crate::quote::cache::QuoteCache;
use crate::quote::source::QuoteSource;
use crate::registry::Registry;

pub struct QuoteService {
    registry: Arc<Registry>,
    source: Arc<dyn QuoteSource>,
    cache: Arc<QuoteCache>,
}

impl QuoteService {
    pub fn new(registry: Arc<Registry>, source: Arc<dyn QuoteSource>, cache: Arc<QuoteCache>) -> Self {
        Self { registry, source, cache }
    }

    /// Returns a quote for `symbol`, using `ttl` as the freshness window.
    /// `ttl` is a parameter of the caller: the poller passes a short window,
    /// the Read API a longer one, over the same shared cache.
    pub async fn get(&self, symbol: &str, ttl: Duration) -> Result<Option<Quote>, RegistryError> {
        let instrument = self.registry.get(symbol)?;

        if let Some(quote) = self.cache.get_fresh(symbol, ttl) {
            return Ok(Some(quote));
        }

        match self.source.snapshot(&instrument.upstream_ticker).await {
            Ok(Some(bar)) => {
                let half_spread = instrument.spread / Decimal::TWO;
                let quote = Quote {
                    symbol: symbol.to_string(),
                    bid: round_half_away_from_zero(bar.close - half_spread, instrument.decimals),
                    ask: round_half_away_from_zero(bar.close + half_spread, instrument.decimals),
                    day_high: round_half_away_from_zero(bar.day_high, instrument.decimals),
                    day_low: round_half_away_from_zero(bar.day_low, instrument.decimals),
                    volume: bar.volume,
                    fetched_at: chrono::Utc::now(),
                };
                self.cache.store(quote.clone());
                Ok(Some(quote))
            }
            Ok(None) => {
                debug!(symbol, "adapter returned no data, falling back to cache");
                Ok(self.cache.get_stale(symbol))
            }
            Err(e) => {
                debug!(symbol, error = %e, "adapter failed, falling back to cache");
                Ok(self.cache.get_stale(symbol))
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Half-away-from-zero rounding to `decimals` places, independent of the
/// banker's rounding `Decimal` would otherwise apply.
pub fn round_half_away_from_zero(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}
