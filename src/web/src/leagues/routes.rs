use crate::AppData;
use crate::error::{ApiError, ApiResult};
use axum::Json;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde_json::{Value, json};

async fn league_get_action(
    State(state): State<AppData>,
    Path(league_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let league = state
        .store
        .leagues
        .get(&league_id)
        .ok_or_else(|| ApiError::NotFound(format!("league {} not found", league_id)))?;
    Ok(Json(json!({ "ok": true, "league": league })))
}

async fn league_table_action(
    State(state): State<AppData>,
    Path(league_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.store.leagues.get(&league_id).is_none() {
        return Err(ApiError::NotFound(format!("league {} not found", league_id)));
    }
    let table = super::league_table(&state.store, &league_id);
    Ok(Json(json!({ "ok": true, "leagueId": league_id, "table": table })))
}

pub fn routes() -> Router<AppData> {
    Router::new()
        .route("/api/leagues/{league_id}", get(league_get_action))
        .route("/api/leagues/{league_id}/table", get(league_table_action))
}
