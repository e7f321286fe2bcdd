//! Domain types shared across the registry, quote pipeline, and database layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Lifecycle state of a user challenge. Transitions are one-way out of `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChallengeStatus {
    Active,
    Failed,
    Passed,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "ACTIVE",
            ChallengeStatus::Failed => "FAILED",
            ChallengeStatus::Passed => "PASSED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(ChallengeStatus::Active),
            "FAILED" => Some(ChallengeStatus::Failed),
            "PASSED" => Some(ChallengeStatus::Passed),
            _ => None,
        }
    }
}

/// A bar returned by the quote source adapter: a midpoint observation with a day range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub close: Decimal,
    pub day_high: Decimal,
    pub day_low: Decimal,
    pub volume: u64,
}

/// A synthesized bid/ask quote, cached in memory and persisted as a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub day_high: Decimal,
    pub day_low: Decimal,
    pub volume: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub fetched_at: DateTime<Utc>,
}

/// A row in `positions`. The engine mutates and deletes these; it never creates them.
#[derive(Debug, Clone)]
pub struct Position {
    pub id: i64,
    pub trading_account_id: i64,
    pub ticket: String,
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    pub open_price: Decimal,
    pub current_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub open_time: DateTime<Utc>,
    pub commission: Decimal,
    pub swap: Decimal,
    pub profit: Decimal,
    pub comment: Option<String>,
    pub magic_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A closed position, written once by the Position Closer and never mutated again.
#[derive(Debug, Clone)]
pub struct Trade {
    pub user_challenge_id: i64,
    pub symbol: String,
    pub side: Side,
    pub lot_size: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub commission: Decimal,
    pub swap: Decimal,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TradingAccount {
    pub id: i64,
    pub balance: Decimal,
    pub is_active: bool,
    pub user_challenge_id: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserChallenge {
    pub id: i64,
    pub trading_account_id: i64,
    pub challenge_id: i64,
    pub current_balance: Decimal,
    pub status: ChallengeStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: i64,
    pub account_size: Decimal,
    pub max_daily_loss: Option<Decimal>,
    pub profit_target: Option<Decimal>,
}
