//! Rule Evaluator: daily-loss limit and profit-target checks for a single
//! touched challenge. Pure over database state; invoked once per close.

use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::models::ChallengeStatus;

use super::{challenge_from_row, decimal_from_row, user_challenge_from_row, Db};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleOutcome {
    NoChange,
    Failed,
    Passed,
}

impl Db {
    /// Evaluates daily-loss and profit-target rules for `user_challenge_id`.
    /// A no-op (idempotent) if the challenge is already `FAILED` or `PASSED`.
    pub async fn evaluate_rules(&self, user_challenge_id: i64) -> Result<RuleOutcome, EngineError> {
        let conn = self.conn.lock().await;

        let user_challenge = conn.query_row(
            "SELECT id, trading_account_id, challenge_id, current_balance, status, updated_at
             FROM user_challenges WHERE id = ?1",
            [user_challenge_id],
            user_challenge_from_row,
        )?;

        if user_challenge.status != ChallengeStatus::Active {
            return Ok(RuleOutcome::NoChange);
        }

        let challenge = conn.query_row(
            "SELECT id, account_size, max_daily_loss, profit_target FROM challenges WHERE id = ?1",
            [user_challenge.challenge_id],
            challenge_from_row,
        )?;

        // Summed in Decimal over the stored strings, not via SQL SUM(CAST AS
        // REAL): the daily-loss comparison below is boundary-exact.
        let mut stmt = conn.prepare(
            "SELECT pnl FROM trades
             WHERE user_challenge_id = ?1 AND status = 'CLOSED' AND date(close_time) = date('now')",
        )?;
        let mut today_pnl = Decimal::ZERO;
        for row in stmt.query_map([user_challenge_id], |row| row.get::<_, String>(0))? {
            today_pnl += decimal_from_row(&row?)?;
        }

        let now = chrono::Utc::now().to_rfc3339();

        if let Some(limit) = challenge.max_daily_loss {
            if today_pnl <= -limit {
                conn.execute(
                    "UPDATE user_challenges SET status = 'FAILED', updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, user_challenge_id],
                )?;
                conn.execute(
                    "UPDATE trading_accounts SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, user_challenge.trading_account_id],
                )?;
                return Ok(RuleOutcome::Failed);
            }
        }

        if let Some(target) = challenge.profit_target {
            if user_challenge.current_balance - challenge.account_size >= target {
                conn.execute(
                    "UPDATE user_challenges SET status = 'PASSED', updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, user_challenge_id],
                )?;
                return Ok(RuleOutcome::Passed);
            }
        }

        Ok(RuleOutcome::NoChange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(db: &Db, current_balance: &str, account_size: &str, max_daily_loss: Option<&str>, profit_target: Option<&str>) {
        let conn = db.conn.lock().await;
        conn.execute(
            "INSERT INTO trading_accounts (id, balance, is_active, user_challenge_id, updated_at)
             VALUES (1, ?1, 1, 1, '2026-07-26T00:00:00Z')",
            [current_balance],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO user_challenges (id, trading_account_id, challenge_id, current_balance, status, updated_at)
             VALUES (1, 1, 1, ?1, 'ACTIVE', '2026-07-26T00:00:00Z')",
            [current_balance],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO challenges (id, account_size, max_daily_loss, profit_target) VALUES (1, ?1, ?2, ?3)",
            rusqlite::params![account_size, max_daily_loss, profit_target],
        )
        .unwrap();
    }

    async fn insert_trade(db: &Db, pnl: &str) {
        let conn = db.conn.lock().await;
        conn.execute(
            "INSERT INTO trades (user_challenge_id, symbol, side, lot_size, entry_price, exit_price, pnl,
                commission, swap, status, open_time, close_time)
             VALUES (1, 'EURUSD', 'BUY', '1', '1.1', '1.09', ?1, '0', '0', 'CLOSED', '2026-07-26T00:00:00Z',
                strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            [pnl],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn daily_loss_breach_fails_challenge_and_disables_account() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        seed(&db, "99000", "100000", Some("1000"), None).await;
        insert_trade(&db, "-600").await;
        insert_trade(&db, "-500").await;

        let outcome = db.evaluate_rules(1).await.unwrap();
        assert_eq!(outcome, RuleOutcome::Failed);

        let conn = db.conn.lock().await;
        let status: String = conn.query_row("SELECT status FROM user_challenges WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(status, "FAILED");
        let active: i64 = conn.query_row("SELECT is_active FROM trading_accounts WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(active, 0);
    }

    #[tokio::test]
    async fn profit_target_reached_passes_challenge() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        seed(&db, "110500", "100000", None, Some("10000")).await;

        let outcome = db.evaluate_rules(1).await.unwrap();
        assert_eq!(outcome, RuleOutcome::Passed);

        let conn = db.conn.lock().await;
        let status: String = conn.query_row("SELECT status FROM user_challenges WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(status, "PASSED");
    }

    #[tokio::test]
    async fn re_evaluating_a_terminal_challenge_is_a_no_op() {
        let db = Db::open_in_memory().unwrap();
        db.init_schema().await.unwrap();
        seed(&db, "50000", "100000", Some("1000"), None).await;
        {
            let conn = db.conn.lock().await;
            conn.execute("UPDATE user_challenges SET status = 'FAILED' WHERE id = 1", []).unwrap();
        }
        let outcome = db.evaluate_rules(1).await.unwrap();
        assert_eq!(outcome, RuleOutcome::NoChange);
    }
}
