//! Poller: the top-level cycle driver. Iterates the universe, acquires a
//! quote, persists the tick, marks positions to market, and evaluates
//! triggers, isolating per-symbol failures from the rest of the cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc, Weekday};
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument as _};

use crate::config::EngineConfig;
use crate::db::Db;
use crate::quote::QuoteService;

pub struct Poller {
    quotes: Arc<QuoteService>,
    db: Db,
    config: EngineConfig,
}

impl Poller {
    pub fn new(quotes: Arc<QuoteService>, db: Db, config: EngineConfig) -> Self {
        Self { quotes, db, config }
    }

    /// Runs the poll loop until `shutdown` resolves. Finishes the in-flight
    /// symbol before returning — it never aborts mid-cycle.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("poller shutting down");
                return;
            }

            self.run_cycle().await;

            let interval = if market_is_open(Utc::now()) {
                self.config.poll_interval_open
            } else {
                self.config.poll_interval_closed
            };

            tokio::select! {
                _ = sleep(Duration::from_secs(interval)) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("poller shutting down mid-sleep");
                        return;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        let symbols: Vec<String> = self.quotes.registry().symbols().map(|s| s.to_string()).collect();
        let ttl = Duration::from_secs(self.config.cache_ttl_poller);

        for symbol in symbols {
            let span = info_span!("poll_symbol", symbol = %symbol);
            if let Err(e) = self.process_symbol(&symbol, ttl).instrument(span).await {
                error!(symbol = %symbol, error = %e, "symbol cycle failed, continuing");
            }
        }
    }

    async fn process_symbol(&self, symbol: &str, ttl: Duration) -> anyhow::Result<()> {
        let quote = match self.quotes.get(symbol, ttl).await? {
            Some(q) => q,
            None => return Ok(()),
        };

        self.db.upsert_tick(&quote).await?;

        let instrument = self.quotes.registry().get(symbol)?;
        self.db
            .mark_to_market(symbol, &quote, instrument.contract_size, self.config.mark_to_market_today_only)
            .await?;

        let triggered = self.db.evaluate_triggers(symbol).await?;
        for close in triggered {
            match self.db.close_position(close.position_id, close.close_price, instrument.contract_size).await? {
                Some(outcome) => {
                    info!(position_id = close.position_id, pnl = %outcome.pnl, "position closed");
                    let rule_outcome = self.db.evaluate_rules(outcome.user_challenge_id).await?;
                    info!(user_challenge_id = outcome.user_challenge_id, ?rule_outcome, "rules evaluated");
                }
                None => {
                    info!(position_id = close.position_id, "position already gone, skipping");
                }
            }
        }

        Ok(())
    }
}

/// Crude weekday heuristic: UTC Mon..Fri is "open", weekend is "closed". Does
/// not account for session boundaries, holidays, or exchange-specific hours.
pub fn market_is_open(now: chrono::DateTime<Utc>) -> bool {
    !matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}
