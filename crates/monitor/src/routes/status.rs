//! Health and Status Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::status::MonitorStatus;
use crate::ApiState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub detection: String,
    pub alarm: String,
    pub voice_override: String,
}

/// Response for the status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub monitor: MonitorStatus,
    pub alarm_active: bool,
}

/// Health check handler
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let monitor = state.status.snapshot();

    Json(HealthResponse {
        status: if monitor.running { "healthy" } else { "stopped" }.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            detection: if monitor.running { "ok" } else { "stopped" }.to_string(),
            alarm: if state.alarm.is_running() { "active" } else { "idle" }.to_string(),
            voice_override: if state.alarm.has_voice_override() { "enabled" } else { "disabled" }
                .to_string(),
        },
    })
}

/// Current detection state
pub async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        monitor: state.status.snapshot(),
        alarm_active: state.alarm.is_running(),
    })
}

/// Prometheus exposition, when a recorder is installed
pub async fn metrics(State(state): State<Arc<ApiState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
