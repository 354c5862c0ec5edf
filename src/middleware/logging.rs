//! Request logging middleware.
//!
//! One line per request: method, path, status code and latency. Headers and
//! bodies are never logged since they carry credentials.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis();
    let status = response.status();

    if status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), latency_ms, "Request failed (5xx)");
    } else if status == StatusCode::UNAUTHORIZED {
        // Expired sessions are routine; keep them out of the INFO stream
        debug!(%method, %path, latency_ms, "Request rejected (401)");
    } else {
        info!(%method, %path, status = status.as_u16(), latency_ms, "Request completed");
    }

    response
}
