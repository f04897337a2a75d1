use crate::error::{ApiError, ApiResult};
use crate::{AppData, auth};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    /// `results/{season}/{league}/{match}.json`
    path: String,
    result: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleRequest {
    match_id: String,
    league_id: String,
}

/// Consumes the asynchronous completion signal: a result artifact addressed
/// by the storage path convention.
async fn ingest_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<IngestRequest>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.results_secret.as_deref())?;
    let outcome = super::ingest_result(&state, &payload.path, &payload.result)?;
    Ok(Json(json!({
        "ok": true,
        "alreadyPlayed": outcome.already_played,
        "leagueCompleted": outcome.league_completed,
    })))
}

/// Synchronous instant settle for batch/offline mode.
async fn settle_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<SettleRequest>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.results_secret.as_deref())?;
    if payload.match_id.is_empty() || payload.league_id.is_empty() {
        return Err(ApiError::InvalidArgument("matchId and leagueId required".into()));
    }
    let outcome = super::settle_match(&state, &payload.league_id, &payload.match_id)?;
    Ok(Json(json!({
        "ok": true,
        "alreadyPlayed": outcome.already_played,
        "leagueCompleted": outcome.league_completed,
    })))
}

/// Public read: score plus goal timeline for one match.
async fn timeline_action(
    State(state): State<AppData>,
    Path(match_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let found = state
        .store
        .fixtures
        .scan(|_, f| f.id == match_id)
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound(format!("fixture {} not found", match_id)))?;
    let (_, fx) = found;
    Ok(Json(json!({
        "ok": true,
        "matchId": fx.id,
        "leagueId": fx.league_id,
        "homeTeamId": fx.home_team_id,
        "awayTeamId": fx.away_team_id,
        "score": fx.score,
        "goalTimeline": fx.goal_timeline.unwrap_or_default(),
        "date": fx.date,
    })))
}

pub fn routes() -> Router<AppData> {
    Router::new()
        .route("/api/results/ingest", post(ingest_action))
        .route("/api/results/settle", post(settle_action))
        .route("/api/matches/{match_id}/timeline", get(timeline_action))
}
