//! Quote Cache: symbol -> last quote + when it was fetched.
//!
//! Safe under concurrent read and single-writer-per-key write via a single
//! `parking_lot::Mutex` guarding the whole map — the freshness window already
//! dedupes concurrent re-fetches of the same symbol, and a plain mutex over a
//! `HashMap` is simpler than per-symbol sharding for the entry counts this
//! engine's universe ever reaches.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::models::Quote;

#[derive(Default)]
pub struct QuoteCache {
    entries: Mutex<HashMap<String, Quote>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached quote for `symbol` if it was fetched within `ttl`.
    pub fn get_fresh(&self, symbol: &str, ttl: Duration) -> Option<Quote> {
        let entries = self.entries.lock();
        let quote = entries.get(symbol)?;
        let age = Utc::now().signed_duration_since(quote.fetched_at);
        if age.to_std().ok()? <= ttl {
            Some(quote.clone())
        } else {
            None
        }
    }

    /// Returns the cached quote for `symbol` regardless of age: the
    /// last-known-good fallback used when the adapter fails.
    pub fn get_stale(&self, symbol: &str) -> Option<Quote> {
        self.entries.lock().get(symbol).cloned()
    }

    /// Overwrites the entry for `quote.symbol`. Entries are never explicitly
    /// deleted, only overwritten on the next successful fetch.
    pub fn store(&self, quote: Quote) {
        self.entries.lock().insert(quote.symbol.clone(), quote);
    }

    pub fn snapshot_all(&self) -> Vec<Quote> {
        self.entries.lock().values().cloned().collect()
    }
}
