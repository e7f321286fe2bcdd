//! Mark-to-Market and Trigger Evaluator: the two per-symbol, per-cycle
//! operations that run against every open position in `positions`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Quote, Side};

use super::{position_from_row, Db};

/// A position that crossed its stop-loss or take-profit this cycle, ready to
/// be handed to the Position Closer.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredClose {
    pub position_id: i64,
    pub close_price: Decimal,
}

const SWAP_RATE: Decimal = dec!(0.000001);

impl Db {
    /// Updates `current_price`, `profit`, and `swap` for every position on
    /// `symbol` opened today (or all positions, if `today_only` is false).
    /// One parameterized statement per symbol per cycle, mirroring the source
    /// contract.
    pub async fn mark_to_market(&self, symbol: &str, quote: &Quote, contract_size: Decimal, today_only: bool) -> rusqlite::Result<()> {
        let conn = self.conn.lock().await;
        let bid = quote.bid.to_string();
        let ask = quote.ask.to_string();
        let contract = contract_size.to_string();
        let swap_rate = SWAP_RATE.to_string();

        let date_filter = if today_only {
            "AND date(created_at) = date('now')"
        } else {
            ""
        };

        let sql = format!(
            "UPDATE positions SET
                current_price = CASE WHEN type = 'BUY' THEN ?1 ELSE ?2 END,
                profit = CASE WHEN type = 'BUY'
                    THEN (CAST(?1 AS REAL) - CAST(open_price AS REAL)) * CAST(volume AS REAL) * CAST(?3 AS REAL)
                    ELSE (CAST(open_price AS REAL) - CAST(?2 AS REAL)) * CAST(volume AS REAL) * CAST(?3 AS REAL)
                END,
                swap = CASE WHEN type = 'BUY'
                    THEN CAST(?4 AS REAL) * CAST(volume AS REAL) * CAST(open_price AS REAL)
                    ELSE -1 * CAST(?4 AS REAL) * CAST(volume AS REAL) * CAST(open_price AS REAL)
                END,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE symbol = ?5 {date_filter}"
        );

        conn.execute(&sql, rusqlite::params![bid, ask, contract, swap_rate, symbol])?;
        Ok(())
    }

    /// Loads every position on `symbol` with a non-null `current_price` and
    /// returns the ones whose stop-loss or take-profit has been crossed,
    /// stop-loss checked first.
    pub async fn evaluate_triggers(&self, symbol: &str) -> rusqlite::Result<Vec<TriggeredClose>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, trading_account_id, ticket, symbol, type, volume, open_price, current_price,
                stop_loss, take_profit, open_time, commission, swap, profit, comment, magic_number, created_at
             FROM positions
             WHERE symbol = ?1 AND current_price IS NOT NULL",
        )?;

        let rows = stmt.query_map([symbol], position_from_row)?;

        let mut closes = Vec::new();
        for row in rows {
            let pos = row?;
            let Some(current_price) = pos.current_price else { continue };
            if let Some(close_price) = decide_close(pos.side, current_price, pos.stop_loss, pos.take_profit) {
                closes.push(TriggeredClose { position_id: pos.id, close_price });
            }
        }
        Ok(closes)
    }
}

/// Pure decision function: stop-loss is tested before take-profit, so if a
/// tick crosses both in the same update, stop-loss wins.
fn decide_close(side: Side, current_price: Decimal, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Option<Decimal> {
    match side {
        Side::Buy => {
            if let Some(sl) = stop_loss {
                if current_price <= sl {
                    return Some(sl);
                }
            }
            if let Some(tp) = take_profit {
                if current_price >= tp {
                    return Some(tp);
                }
            }
        }
        Side::Sell => {
            if let Some(sl) = stop_loss {
                if current_price >= sl {
                    return Some(sl);
                }
            }
            if let Some(tp) = take_profit {
                if current_price <= tp {
                    return Some(tp);
                }
            }
        }
    }
    None
}
