//! End-to-end scenarios matching the worked examples: a full tick ->
//! mark-to-market -> trigger -> close -> rule-eval cycle for both a
//! stop-loss and a take-profit close, plus the two challenge-lifecycle
//! transitions.

use chrono::Utc;
use rust_decimal_macros::dec;

use crate::db::rules::RuleOutcome;
use crate::models::Quote;

use super::Db;

async fn exec(db: &Db, sql: &str) {
    db.conn.lock().await.execute(sql, []).unwrap();
}

async fn seed_account_and_challenge(db: &Db, balance: &str, account_size: &str, max_daily_loss: Option<&str>, profit_target: Option<&str>) {
    exec(db, &format!(
        "INSERT INTO trading_accounts (id, balance, is_active, user_challenge_id, updated_at)
         VALUES (1, '{balance}', 1, 1, '2026-07-26T00:00:00Z')"
    )).await;
    exec(db, &format!(
        "INSERT INTO user_challenges (id, trading_account_id, challenge_id, current_balance, status, updated_at)
         VALUES (1, 1, 1, '{balance}', 'ACTIVE', '2026-07-26T00:00:00Z')"
    )).await;
    let max_daily_loss_sql = max_daily_loss.map(|v| format!("'{v}'")).unwrap_or_else(|| "NULL".to_string());
    let profit_target_sql = profit_target.map(|v| format!("'{v}'")).unwrap_or_else(|| "NULL".to_string());
    exec(db, &format!(
        "INSERT INTO challenges (id, account_size, max_daily_loss, profit_target)
         VALUES (1, '{account_size}', {max_daily_loss_sql}, {profit_target_sql})"
    )).await;
}

#[allow(clippy::too_many_arguments)]
async fn seed_position(db: &Db, id: i64, symbol: &str, side: &str, volume: &str, open_price: &str, stop_loss: Option<&str>, take_profit: Option<&str>, commission: &str) {
    let sl = stop_loss.map(|v| format!("'{v}'")).unwrap_or_else(|| "NULL".to_string());
    let tp = take_profit.map(|v| format!("'{v}'")).unwrap_or_else(|| "NULL".to_string());
    exec(db, &format!(
        "INSERT INTO positions (id, trading_account_id, ticket, symbol, type, volume, open_price,
            current_price, stop_loss, take_profit, open_time, commission, swap, profit, created_at)
         VALUES ({id}, 1, 't{id}', '{symbol}', '{side}', '{volume}', '{open_price}', NULL, {sl}, {tp},
            '2026-07-26T00:00:00Z', '{commission}', '0', '0', date('now') || 'T00:00:00Z')"
    )).await;
}

fn quote(symbol: &str, bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> Quote {
    Quote { symbol: symbol.to_string(), bid, ask, day_high: ask, day_low: bid, volume: 100, fetched_at: Utc::now() }
}

#[tokio::test]
async fn buy_stop_loss_hit_matches_worked_example() {
    let db = Db::open_in_memory().unwrap();
    db.init_schema().await.unwrap();
    seed_account_and_challenge(&db, "100000", "100000", None, None).await;
    seed_position(&db, 1, "EURUSD", "BUY", "1", "1.10000", Some("1.09500"), Some("1.11000"), "5.00").await;

    let q = quote("EURUSD", dec!(1.09390), dec!(1.09410));
    db.mark_to_market("EURUSD", &q, dec!(100000), true).await.unwrap();

    let triggered = db.evaluate_triggers("EURUSD").await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].close_price, dec!(1.09500));

    let outcome = db.close_position(triggered[0].position_id, triggered[0].close_price, dec!(100000)).await.unwrap().unwrap();
    // Mark-to-market has already accrued one tick of swap (see db::triggers)
    // before the close reads it, so the pnl is the spec's worked -505.00
    // example minus that tick's swap, not exactly -505.00.
    let accrued_swap = dec!(0.000001) * dec!(1) * dec!(1.10000);
    assert_eq!(outcome.pnl, dec!(-505.00000) - accrued_swap);
    assert_eq!(outcome.new_balance, dec!(100000) + outcome.pnl);
}

#[tokio::test]
async fn sell_take_profit_hit_matches_worked_example() {
    let db = Db::open_in_memory().unwrap();
    db.init_schema().await.unwrap();
    seed_account_and_challenge(&db, "100000", "100000", None, None).await;
    seed_position(&db, 1, "USDJPY", "SELL", "0.5", "150.00", None, Some("149.00"), "0").await;

    let q = quote("USDJPY", dec!(148.89), dec!(148.91));
    db.mark_to_market("USDJPY", &q, dec!(100000), true).await.unwrap();

    let triggered = db.evaluate_triggers("USDJPY").await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].close_price, dec!(149.00));

    let outcome = db.close_position(triggered[0].position_id, triggered[0].close_price, dec!(100000)).await.unwrap().unwrap();
    let accrued_swap = -(dec!(0.000001) * dec!(0.5) * dec!(150.00));
    assert_eq!(outcome.pnl, dec!(50000.00000) - accrued_swap);
}

#[tokio::test]
async fn accumulated_daily_loss_fails_challenge_and_disables_account() {
    let db = Db::open_in_memory().unwrap();
    db.init_schema().await.unwrap();
    seed_account_and_challenge(&db, "100000", "100000", Some("1000"), None).await;
    seed_position(&db, 1, "EURUSD", "BUY", "1", "1.10000", Some("1.09000"), None, "0").await;

    let q = quote("EURUSD", dec!(1.08900), dec!(1.08920));
    db.mark_to_market("EURUSD", &q, dec!(100000), true).await.unwrap();
    let triggered = db.evaluate_triggers("EURUSD").await.unwrap();
    let outcome = db.close_position(triggered[0].position_id, triggered[0].close_price, dec!(100000)).await.unwrap().unwrap();

    exec(&db, "INSERT INTO trades (user_challenge_id, symbol, side, lot_size, entry_price, exit_price, pnl, commission, swap, status, open_time, close_time)
        VALUES (1, 'GBPUSD', 'BUY', '1', '1.0', '1.0', '-600', '0', '0', 'CLOSED', '2026-07-26T00:00:00Z', strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))").await;

    let rule_outcome = db.evaluate_rules(outcome.user_challenge_id).await.unwrap();
    assert_eq!(rule_outcome, RuleOutcome::Failed);

    let conn = db.conn.lock().await;
    let active: i64 = conn.query_row("SELECT is_active FROM trading_accounts WHERE id = 1", [], |r| r.get(0)).unwrap();
    assert_eq!(active, 0);
}

#[tokio::test]
async fn profit_target_reached_passes_challenge() {
    // Closed directly at the trigger price with zero commission/swap, the way
    // the worked example in the spec is stated — mark-to-market's nonzero
    // swap accrual is exercised separately in `buy_stop_loss_hit_matches_worked_example`.
    let db = Db::open_in_memory().unwrap();
    db.init_schema().await.unwrap();
    seed_account_and_challenge(&db, "108500", "100000", None, Some("10000")).await;
    seed_position(&db, 1, "EURUSD", "BUY", "1", "1.10000", None, Some("1.12000"), "0").await;

    let outcome = db.close_position(1, dec!(1.12000), dec!(100000)).await.unwrap().unwrap();
    assert_eq!(outcome.pnl, dec!(2000.00000));
    assert_eq!(outcome.new_balance, dec!(110500));

    let rule_outcome = db.evaluate_rules(outcome.user_challenge_id).await.unwrap();
    assert_eq!(rule_outcome, RuleOutcome::Passed);
}
