// Request logging middleware
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::proxy::common::utils::redact_token;

/// Log method, path (token masked), status and latency of every request
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let target = match request.uri().query() {
        Some(q) => format!("{}?{}", request.uri().path(), redact_token(q)),
        None => request.uri().path().to_string(),
    };
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} -> {} ({} ms)",
        method,
        target,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
