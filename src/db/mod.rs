//! Database layer: a single sqlite connection shared behind an async mutex,
//! the way the teacher's `VaultDb` holds its connection. The database is the
//! sole consistency authority for positions/trades/accounts/challenges; the
//! in-memory quote cache is advisory only.

pub mod closer;
pub mod rules;
pub mod ticks;
pub mod triggers;

#[cfg(test)]
mod scenario_tests;

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::models::{Challenge, ChallengeStatus, Position, Side, TradingAccount, UserChallenge};

#[derive(Clone)]
pub struct Db {
    conn: std::sync::Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn: std::sync::Arc::new(Mutex::new(conn)) };
        Ok(db)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: std::sync::Arc::new(Mutex::new(conn)) })
    }

    pub async fn init_schema(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS market_data (
                symbol TEXT NOT NULL,
                bid TEXT NOT NULL,
                ask TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                volume INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (symbol, timestamp)
            );

            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY,
                trading_account_id INTEGER NOT NULL,
                ticket TEXT NOT NULL,
                symbol TEXT NOT NULL,
                type TEXT NOT NULL,
                volume TEXT NOT NULL,
                open_price TEXT NOT NULL,
                current_price TEXT,
                stop_loss TEXT,
                take_profit TEXT,
                open_time TEXT NOT NULL,
                commission TEXT NOT NULL,
                swap TEXT NOT NULL,
                profit TEXT NOT NULL,
                comment TEXT,
                magic_number INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions(symbol);

            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_challenge_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                lot_size TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                exit_price TEXT NOT NULL,
                pnl TEXT NOT NULL,
                commission TEXT NOT NULL,
                swap TEXT NOT NULL,
                status TEXT NOT NULL,
                open_time TEXT NOT NULL,
                close_time TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_challenge_close ON trades(user_challenge_id, close_time);

            CREATE TABLE IF NOT EXISTS trading_accounts (
                id INTEGER PRIMARY KEY,
                balance TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                user_challenge_id INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_challenges (
                id INTEGER PRIMARY KEY,
                trading_account_id INTEGER NOT NULL,
                challenge_id INTEGER NOT NULL,
                current_balance TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS challenges (
                id INTEGER PRIMARY KEY,
                account_size TEXT NOT NULL,
                max_daily_loss TEXT,
                profit_target TEXT
            );
            ",
        )
    }
}

/// Parses a `TEXT`-stored decimal column. Centralised so every call site
/// reads/writes prices the same way.
pub(crate) fn decimal_from_row(raw: &str) -> rusqlite::Result<rust_decimal::Decimal> {
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parses a `TEXT`-stored RFC3339 timestamp column.
pub(crate) fn datetime_from_row(raw: &str) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

/// Maps a full `positions` row, in the column order every call site selects
/// it in: `id, trading_account_id, ticket, symbol, type, volume, open_price,
/// current_price, stop_loss, take_profit, open_time, commission, swap,
/// profit, comment, magic_number, created_at`.
pub(crate) fn position_from_row(row: &rusqlite::Row) -> rusqlite::Result<Position> {
    Ok(Position {
        id: row.get(0)?,
        trading_account_id: row.get(1)?,
        ticket: row.get(2)?,
        symbol: row.get(3)?,
        side: Side::parse(&row.get::<_, String>(4)?).unwrap_or(Side::Buy),
        volume: decimal_from_row(&row.get::<_, String>(5)?)?,
        open_price: decimal_from_row(&row.get::<_, String>(6)?)?,
        current_price: row.get::<_, Option<String>>(7)?.map(|s| decimal_from_row(&s)).transpose()?,
        stop_loss: row.get::<_, Option<String>>(8)?.map(|s| decimal_from_row(&s)).transpose()?,
        take_profit: row.get::<_, Option<String>>(9)?.map(|s| decimal_from_row(&s)).transpose()?,
        open_time: datetime_from_row(&row.get::<_, String>(10)?)?,
        commission: decimal_from_row(&row.get::<_, String>(11)?)?,
        swap: decimal_from_row(&row.get::<_, String>(12)?)?,
        profit: decimal_from_row(&row.get::<_, String>(13)?)?,
        comment: row.get(14)?,
        magic_number: row.get(15)?,
        created_at: datetime_from_row(&row.get::<_, String>(16)?)?,
    })
}

/// Maps a full `trading_accounts` row: `id, balance, is_active,
/// user_challenge_id, updated_at`.
pub(crate) fn trading_account_from_row(row: &rusqlite::Row) -> rusqlite::Result<TradingAccount> {
    Ok(TradingAccount {
        id: row.get(0)?,
        balance: decimal_from_row(&row.get::<_, String>(1)?)?,
        is_active: row.get::<_, i64>(2)? != 0,
        user_challenge_id: row.get(3)?,
        updated_at: datetime_from_row(&row.get::<_, String>(4)?)?,
    })
}

/// Maps a full `user_challenges` row: `id, trading_account_id,
/// challenge_id, current_balance, status, updated_at`.
pub(crate) fn user_challenge_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserChallenge> {
    Ok(UserChallenge {
        id: row.get(0)?,
        trading_account_id: row.get(1)?,
        challenge_id: row.get(2)?,
        current_balance: decimal_from_row(&row.get::<_, String>(3)?)?,
        status: ChallengeStatus::parse(&row.get::<_, String>(4)?).unwrap_or(ChallengeStatus::Active),
        updated_at: datetime_from_row(&row.get::<_, String>(5)?)?,
    })
}

/// Maps a full `challenges` row: `id, account_size, max_daily_loss,
/// profit_target`.
pub(crate) fn challenge_from_row(row: &rusqlite::Row) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        account_size: decimal_from_row(&row.get::<_, String>(1)?)?,
        max_daily_loss: row.get::<_, Option<String>>(2)?.map(|s| decimal_from_row(&s)).transpose()?,
        profit_target: row.get::<_, Option<String>>(3)?.map(|s| decimal_from_row(&s)).transpose()?,
    })
}
