//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency.
//! Query strings are never logged; reset links carry their token there.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

const QUIET_PATHS: &[&str] = &["/api/health", "/metrics"];

/// Logs at INFO for normal traffic and WARN for server errors
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip health checks and scrapes to reduce noise
    if QUIET_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            "Request failed (5xx)"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            "Request completed"
        );
    }

    response
}
