//! Tick Persister: upserts one market data observation per (symbol, timestamp).

use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::models::Quote;

use super::Db;

impl Db {
    /// Upserts `quote` into `market_data`. On conflict over `(symbol, timestamp)`
    /// overwrites bid/ask/high/low/volume — the same row replayed twice (e.g. a
    /// retried cycle) is harmless.
    pub async fn upsert_tick(&self, quote: &Quote) -> rusqlite::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO market_data (symbol, bid, ask, high, low, volume, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(symbol, timestamp) DO UPDATE SET
                bid = excluded.bid,
                ask = excluded.ask,
                high = excluded.high,
                low = excluded.low,
                volume = excluded.volume",
            rusqlite::params![
                quote.symbol,
                quote.bid.to_string(),
                quote.ask.to_string(),
                quote.day_high.to_string(),
                quote.day_low.to_string(),
                quote.volume as i64,
                quote.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Bulk-inserts backfilled ticks, skipping any row whose `(symbol, timestamp)`
    /// already exists. Used only by the historical backfill, which runs once a
    /// day and must tolerate being re-run the same day as a no-op.
    pub async fn insert_ticks_ignore_conflicts(&self, quotes: &[Quote]) -> rusqlite::Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO market_data (symbol, bid, ask, high, low, volume, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for quote in quotes {
                let changed = stmt.execute(rusqlite::params![
                    quote.symbol,
                    quote.bid.to_string(),
                    quote.ask.to_string(),
                    quote.day_high.to_string(),
                    quote.day_low.to_string(),
                    quote.volume as i64,
                    quote.fetched_at.to_rfc3339(),
                ])?;
                inserted += changed;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub async fn latest_tick_timestamp(&self, symbol: &str) -> rusqlite::Result<Option<chrono::DateTime<Utc>>> {
        let conn = self.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT timestamp FROM market_data WHERE symbol = ?1 ORDER BY timestamp DESC LIMIT 1",
                [symbol],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str, fetched_at: chrono::DateTime<Utc>) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            bid: dec!(1.0),
            ask: dec!(1.1),
            day_high: dec!(1.2),
            day_low: dec!(0.9),
            volume: 10,
            fetched_at,
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_same_key() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        let ts = Utc::now();
        db.upsert_tick(&quote("EURUSD", ts)).await.unwrap();
        let mut q2 = quote("EURUSD", ts);
        q2.bid = dec!(2.0);
        db.upsert_tick(&q2).await.unwrap();

        let conn = db.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM market_data", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
        let bid: String = conn.query_row("SELECT bid FROM market_data", [], |r| r.get(0)).unwrap();
        assert_eq!(bid, "2.0");
    }

    #[tokio::test]
    async fn backfill_insert_is_idempotent() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        let ts = Utc::now();
        let rows = vec![quote("GOLD", ts)];
        let first = db.insert_ticks_ignore_conflicts(&rows).await.unwrap();
        let second = db.insert_ticks_ignore_conflicts(&rows).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }
}
