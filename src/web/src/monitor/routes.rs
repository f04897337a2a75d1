use crate::error::ApiResult;
use crate::{AppData, auth};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde_json::json;

/// Secret-guarded watchdog check. A clean sweep answers 200; any problem
/// answers 500 with the list so the caller's alerting fires.
async fn watchdog_action(
    State(state): State<AppData>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    auth::require_secret(&headers, state.config.scheduler_secret.as_deref())?;
    let report = super::run_watchdog(&state.store, &state.config, Utc::now());
    let body = Json(json!({
        "ok": report.ok,
        "day": report.day,
        "problems": report.problems,
        "scheduledPast": report.scheduled_past,
        "longRunning": report.long_running,
    }));
    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, body).into_response())
}

pub fn routes() -> Router<AppData> {
    Router::new().route("/api/monitor/watchdog", get(watchdog_action))
}
