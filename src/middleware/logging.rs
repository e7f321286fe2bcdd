//! Request logging middleware for the Read API.
//!
//! Every request except `/health` (to cut log noise) gets one `tracing`
//! event at INFO, or WARN for a 4xx/5xx response, carrying method, path,
//! status, and latency in milliseconds.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if status >= 400 {
        warn!(%method, %path, status, latency_ms, "request completed");
    } else {
        info!(%method, %path, status, latency_ms, "request completed");
    }

    response
}
