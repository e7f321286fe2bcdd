use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::models::Quote;

use super::ApiState;

#[derive(Serialize)]
struct QuoteDto {
    symbol: String,
    bid: rust_decimal::Decimal,
    ask: rust_decimal::Decimal,
    high: rust_decimal::Decimal,
    low: rust_decimal::Decimal,
    volume: u64,
    timestamp: i64,
}

impl From<&Quote> for QuoteDto {
    fn from(q: &Quote) -> Self {
        Self {
            symbol: q.symbol.clone(),
            bid: q.bid,
            ask: q.ask,
            high: q.day_high,
            low: q.day_low,
            volume: q.volume,
            timestamp: q.fetched_at.timestamp(),
        }
    }
}

fn not_found(symbol: &str) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no quote available for {symbol}"), "timestamp": Utc::now().timestamp() })),
    )
}

pub async fn get_all_prices(State(state): State<ApiState>) -> impl IntoResponse {
    let mut prices: HashMap<String, QuoteDto> = HashMap::new();

    let symbols: Vec<String> = state.quotes.registry().symbols().map(|s| s.to_string()).collect();
    for symbol in symbols {
        if let Ok(Some(quote)) = state.quotes.get(&symbol, state.cache_ttl_api).await {
            prices.insert(symbol, QuoteDto::from(&quote));
        }
    }

    Json(json!({ "prices": prices, "timestamp": Utc::now().timestamp() }))
}

pub async fn get_price(State(state): State<ApiState>, Path(symbol): Path<String>) -> axum::response::Response {
    if !state.quotes.registry().contains(&symbol) {
        return not_found(&symbol).into_response();
    }

    match state.quotes.get(&symbol, state.cache_ttl_api).await {
        Ok(Some(quote)) => Json(QuoteDto::from(&quote)).into_response(),
        Ok(None) | Err(_) => not_found(&symbol).into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "timestamp": Utc::now().timestamp() }))
}
