//! Position Closer: the single transaction that retires a triggered position.

use chrono::Utc;
use rust_decimal::Decimal;
use rusqlite::OptionalExtension;

use crate::error::EngineError;
use crate::models::{Side, Trade};

use super::{position_from_row, trading_account_from_row, Db};

/// Outcome of a successful close, passed on to the Rule Evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub user_challenge_id: i64,
    pub pnl: Decimal,
    pub new_balance: Decimal,
}

impl Db {
    /// Closes `position_id` at `close_price` in one transaction: inserts the
    /// `trades` row, credits the account, updates the challenge's running
    /// balance, and deletes the position. Returns `Ok(None)` if the position
    /// has already vanished (e.g. closed by a concurrent cycle) rather than
    /// erroring — the caller skips the Rule Evaluator in that case.
    pub async fn close_position(&self, position_id: i64, close_price: Decimal, contract_size: Decimal) -> Result<Option<CloseOutcome>, EngineError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let position = tx
            .query_row(
                "SELECT id, trading_account_id, ticket, symbol, type, volume, open_price, current_price,
                    stop_loss, take_profit, open_time, commission, swap, profit, comment, magic_number, created_at
                 FROM positions WHERE id = ?1",
                [position_id],
                position_from_row,
            )
            .optional()?;

        let Some(pos) = position else {
            tx.rollback()?;
            return Ok(None);
        };

        let pnl = match pos.side {
            Side::Buy => (close_price - pos.open_price) * pos.volume * contract_size - pos.commission - pos.swap,
            Side::Sell => (pos.open_price - close_price) * pos.volume * contract_size - pos.commission - pos.swap,
        };

        let account = tx.query_row(
            "SELECT id, balance, is_active, user_challenge_id, updated_at FROM trading_accounts WHERE id = ?1",
            [pos.trading_account_id],
            trading_account_from_row,
        )?;

        // Computed in Decimal, not round-tripped through sqlite REAL: the
        // closer already holds an exact pnl, and the §8 balance invariant is
        // exact, not epsilon-exact.
        let new_balance = account.balance + pnl;
        let now = Utc::now().to_rfc3339();

        let trade = Trade {
            user_challenge_id: account.user_challenge_id,
            symbol: pos.symbol,
            side: pos.side,
            lot_size: pos.volume,
            entry_price: pos.open_price,
            exit_price: close_price,
            pnl,
            commission: pos.commission,
            swap: pos.swap,
            open_time: pos.open_time,
            close_time: Utc::now(),
        };

        tx.execute(
            "INSERT INTO trades (user_challenge_id, symbol, side, lot_size, entry_price, exit_price, pnl, commission, swap, status, open_time, close_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'CLOSED', ?10, ?11)",
            rusqlite::params![
                trade.user_challenge_id,
                trade.symbol,
                trade.side.as_str(),
                trade.lot_size.to_string(),
                trade.entry_price.to_string(),
                trade.exit_price.to_string(),
                trade.pnl.to_string(),
                trade.commission.to_string(),
                trade.swap.to_string(),
                trade.open_time.to_rfc3339(),
                trade.close_time.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE trading_accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![new_balance.to_string(), now, account.id],
        )?;

        tx.execute(
            "UPDATE user_challenges SET current_balance = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![new_balance.to_string(), now, account.user_challenge_id],
        )?;

        tx.execute("DELETE FROM positions WHERE id = ?1", [position_id])?;

        tx.commit()?;

        Ok(Some(CloseOutcome { user_challenge_id: account.user_challenge_id, pnl, new_balance }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn seed(db: &Db) {
        let conn = db.conn.lock().await;
        conn.execute(
            "INSERT INTO trading_accounts (id, balance, is_active, user_challenge_id, updated_at)
             VALUES (1, '100000', 1, 1, '2026-07-26T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO user_challenges (id, trading_account_id, challenge_id, current_balance, status, updated_at)
             VALUES (1, 1, 1, '100000', 'ACTIVE', '2026-07-26T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO positions (id, trading_account_id, ticket, symbol, type, volume, open_price,
                current_price, stop_loss, take_profit, open_time, commission, swap, profit, created_at)
             VALUES (1, 1, 't1', 'EURUSD', 'BUY', '1', '1.10000', '1.09400', '1.09500', '1.11000',
                '2026-07-26T00:00:00Z', '5.00', '0', '0', '2026-07-26T00:00:00Z')",
            [],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn closing_at_stop_loss_matches_worked_example() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        seed(&db).await;

        let outcome = db.close_position(1, dec!(1.09500), dec!(100000)).await.unwrap().unwrap();
        assert_eq!(outcome.pnl, dec!(-505.00000));
        assert_eq!(outcome.new_balance, dec!(99495));

        let conn = db.conn.lock().await;
        let remaining: i64 = conn.query_row("SELECT COUNT(*) FROM positions WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining, 0);
        let trades: i64 = conn.query_row("SELECT COUNT(*) FROM trades", [], |r| r.get(0)).unwrap();
        assert_eq!(trades, 1);
    }

    #[tokio::test]
    async fn closing_vanished_position_is_a_no_op() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        seed(&db).await;

        let result = db.close_position(999, dec!(1.0), dec!(100000)).await.unwrap();
        assert!(result.is_none());
    }
}
