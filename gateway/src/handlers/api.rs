//! Health check endpoints

use axum::{Json, http::HeaderMap};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Request headers safe to log from health probes
pub const HEALTH_HEADER_ALLOWLIST: [&str; 5] = [
    "host",
    "user-agent",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-cloud-trace-context",
];

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    fn ok() -> Json<Self> {
        Json(Self { status: "ok" })
    }
}

/// Allow-listed headers, lowercased, for logging
pub fn safe_health_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| HEALTH_HEADER_ALLOWLIST.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// `GET /health`, `/health/`, `/healthz`, `/healthz/`
pub async fn health_check(headers: HeaderMap) -> Json<HealthResponse> {
    info!(headers = ?safe_health_headers(&headers), "health called");
    HealthResponse::ok()
}

/// `GET /ping`, used by client health probes
pub async fn ping() -> Json<HealthResponse> {
    HealthResponse::ok()
}
