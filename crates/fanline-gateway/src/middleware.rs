//! Request middleware for tracing

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Logging middleware
pub async fn logging(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        latency_us = start.elapsed().as_micros() as u64,
        "request complete"
    );

    response
}
