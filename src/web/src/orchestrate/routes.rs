use crate::error::{ApiError, ApiResult};
use crate::{AppData, auth};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    match_id: String,
    league_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PlayDayRequest {
    #[serde(default)]
    day_key: Option<String>,
    #[serde(default)]
    instant_settle: bool,
}

/// The work-item endpoint the task channel delivers to.
async fn start_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<StartRequest>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.start_secret.as_deref())?;
    if payload.match_id.is_empty() || payload.league_id.is_empty() {
        return Err(ApiError::InvalidArgument("matchId and leagueId required".into()));
    }
    let report =
        super::start_match_internal(&state, &payload.match_id, &payload.league_id, false).await?;
    Ok(Json(json!({ "ok": true, "skipped": report.skipped, "dispatched": report.dispatched })))
}

/// Manual dispatch trigger; the scheduler loop calls the internal fn
/// directly. Accepts the scheduler secret or an operator identity.
async fn play_day_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    payload: Option<Json<PlayDayRequest>>,
) -> ApiResult<Json<Value>> {
    if auth::require_secret(&headers, state.config.scheduler_secret.as_deref()).is_err() {
        auth::require_operator(&headers)?;
    }
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let report = super::play_day(&state, payload.day_key, payload.instant_settle).await?;
    Ok(Json(json!({
        "ok": true,
        "day": report.day,
        "total": report.total,
        "enqueued": report.enqueued,
        "started": report.started,
        "settled": report.settled,
        "failed": report.failed,
    })))
}

pub fn routes() -> Router<AppData> {
    Router::new()
        .route("/api/orchestrate/start", post(start_action))
        .route("/api/orchestrate/play-day", post(play_day_action))
}
