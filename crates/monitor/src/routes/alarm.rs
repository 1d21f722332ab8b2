//! Alarm Routes

use alerting::AlarmStats;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::ApiState;

/// Response for alarm endpoints
#[derive(Debug, Serialize)]
pub struct AlarmResponse {
    pub active: bool,
    pub playing: bool,
    pub stats: AlarmStats,
}

fn alarm_response(state: &ApiState) -> AlarmResponse {
    AlarmResponse {
        active: state.alarm.is_running(),
        playing: state.alarm.is_playing(),
        stats: state.alarm.stats(),
    }
}

/// Get alarm state
pub async fn get_alarm(State(state): State<Arc<ApiState>>) -> Json<AlarmResponse> {
    Json(alarm_response(&state))
}

/// Silence the alarm
pub async fn stop_alarm(State(state): State<Arc<ApiState>>) -> Json<AlarmResponse> {
    info!("Alarm stop requested over API");
    state.alarm.stop();
    Json(alarm_response(&state))
}
