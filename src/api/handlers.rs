use axum::{Json, extract::State as AxumState};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::error::ApiError;
use crate::SharedState;

pub const SERVER_IDENTITY: &str = "git_webhook_deploy is running";

/// GET / - Identifies the server
pub async fn root() -> Json<Value> {
    Json(json!({ "message": SERVER_IDENTITY }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server started
    pub uptime: f64,
    pub version: &'static str,
    pub runtime_version: String,
    pub platform: String,
}

/// GET /health
pub async fn health(AxumState(state): AxumState<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.start_time.elapsed().as_secs_f64(),
        version: env!("CARGO_PKG_VERSION"),
        runtime_version: format!("rust {}", env!("CARGO_PKG_RUST_VERSION")),
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
    })
}

/// Any unknown route or method
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
