//! Read API: exposes the Quote Cache over plain HTTP.
//! `GET /api/prices`, `GET /api/prices/{symbol}`, `GET /health`.

pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::quote::QuoteService;

#[derive(Clone)]
pub struct ApiState {
    pub quotes: Arc<QuoteService>,
    pub cache_ttl_api: Duration,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/prices", axum::routing::get(routes::get_all_prices))
        .route("/api/prices/:symbol", axum::routing::get(routes::get_price))
        .route("/health", axum::routing::get(routes::health))
        .layer(axum::middleware::from_fn(crate::middleware::logging::request_logging))
        .layer(cors)
        .with_state(state)
}
