//! Access logging
//!
//! One structured `info` event per completed request, skipping the health
//! endpoint so liveness checks do not flood the logs.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use super::identity::{HEADER_TENANT_ID, HEADER_USER_ID};
use crate::health::HEALTH_PATH;

fn header_str(req: &Request, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Middleware emitting one access log event per request
pub async fn access_log(req: Request, next: Next) -> Response {
    if req.uri().path() == HEALTH_PATH {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let user_agent = header_str(&req, "user-agent");
    let forwarded_for = header_str(&req, "x-forwarded-for");
    let request_id = header_str(&req, "x-request-id");
    let user_id = header_str(&req, HEADER_USER_ID);
    let tenant_id = header_str(&req, HEADER_TENANT_ID);

    let start = Instant::now();
    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        status = response.status().as_u16(),
        method = %method,
        path = %path,
        latency_ms,
        user_agent = %user_agent,
        x_forwarded_for = %forwarded_for,
        x_request_id = %request_id,
        x_user_id = %user_id,
        x_tenant_id = %tenant_id,
        "request completed"
    );

    response
}
