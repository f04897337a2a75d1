use crate::error::{ApiError, ApiResult};
use crate::results;
use crate::{AppData, auth};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use league_core::league::LeagueState;
use serde::Deserialize;
use serde_json::{Value, json};
use store::{BootstrapConfig, Bootstrapper};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RebuildRequest {
    league_id: String,
    #[serde(default = "default_true")]
    force: bool,
    #[serde(default)]
    dry_run: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RebuildAllRequest {
    #[serde(default)]
    states: Option<Vec<LeagueState>>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default = "default_true")]
    force: bool,
}

impl Default for RebuildAllRequest {
    fn default() -> Self {
        RebuildAllRequest {
            states: None,
            cursor: None,
            limit: None,
            force: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupRequest {
    team_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeasonResetRequest {
    league_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BackfillRequest {
    #[serde(default)]
    until: Option<String>,
    #[serde(default)]
    max_matches: Option<usize>,
    #[serde(default)]
    dry_run: bool,
}

async fn rebuild_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<RebuildRequest>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    if payload.league_id.is_empty() {
        return Err(ApiError::InvalidArgument("leagueId required".into()));
    }
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        super::rebuild_fixtures(
            &store,
            &payload.league_id,
            payload.force,
            payload.dry_run,
            Utc::now(),
        )
    })
    .await
    .map_err(|e| ApiError::Internal(format!("rebuild task panicked: {}", e)))??;
    Ok(Json(json!({ "ok": true, "report": report })))
}

async fn rebuild_all_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    payload: Option<Json<RebuildAllRequest>>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let states = payload
        .states
        .unwrap_or_else(|| vec![LeagueState::Scheduled, LeagueState::Active]);
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        super::rebuild_all_fixtures(
            &store,
            &states,
            payload.cursor.as_deref(),
            payload.limit,
            payload.force,
            Utc::now(),
        )
    })
    .await
    .map_err(|e| ApiError::Internal(format!("rebuild task panicked: {}", e)))?;
    Ok(Json(json!({
        "ok": true,
        "processed": report.processed,
        "reports": report.reports,
        "nextCursor": report.next_cursor,
        "hasMore": report.has_more,
    })))
}

async fn cleanup_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<CleanupRequest>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    if payload.team_id.is_empty() {
        return Err(ApiError::InvalidArgument("teamId required".into()));
    }
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        super::cleanup_team(&store, &payload.team_id, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("cleanup task panicked: {}", e)))??;
    Ok(Json(json!({ "ok": true, "report": report })))
}

async fn bootstrap_action(
    State(state): State<AppData>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    let store = state.store.clone();
    let config = BootstrapConfig {
        league_count: state.config.league_count,
        ..BootstrapConfig::default()
    };
    let report = tokio::task::spawn_blocking(move || {
        Bootstrapper::run(&store, &config, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("bootstrap task panicked: {}", e)))?
    .map_err(ApiError::from)?;
    Ok(Json(json!({ "ok": true, "report": report })))
}

async fn reset_season_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<SeasonResetRequest>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    if payload.league_id.is_empty() {
        return Err(ApiError::InvalidArgument("leagueId required".into()));
    }
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        super::reset_league_season(&store, &payload.league_id, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("season reset task panicked: {}", e)))??;
    Ok(Json(json!({ "ok": true, "report": report })))
}

async fn backfill_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    payload: Option<Json<BackfillRequest>>,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let app = state.clone();
    let report = tokio::task::spawn_blocking(move || {
        results::backfill(&app, payload.until, payload.max_matches, payload.dry_run)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("backfill task panicked: {}", e)))??;
    Ok(Json(json!({ "ok": true, "report": report })))
}

pub fn routes() -> Router<AppData> {
    Router::new()
        .route("/api/admin/fixtures/rebuild", post(rebuild_action))
        .route("/api/admin/fixtures/rebuild-all", post(rebuild_all_action))
        .route("/api/admin/cleanup-team", post(cleanup_action))
        .route("/api/admin/reset-season", post(reset_season_action))
        .route("/api/admin/bootstrap", post(bootstrap_action))
        .route("/api/admin/backfill", post(backfill_action))
}
