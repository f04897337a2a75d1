use crate::error::{ApiError, ApiResult};
use crate::{AppData, auth};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    team_id: String,
}

/// Resolves the team behind an authenticated call, enforcing ownership.
fn owned_team(
    state: &AppData,
    headers: &HeaderMap,
    team_id: &str,
) -> Result<league_core::Team, ApiError> {
    let identity = auth::identity(headers)?;
    if team_id.is_empty() {
        return Err(ApiError::InvalidArgument("teamId required".into()));
    }
    let team = state
        .store
        .teams
        .get(team_id)
        .ok_or_else(|| ApiError::NotFound("team not found".into()))?;
    if let Some(owner) = &team.owner_uid {
        if owner != &identity.uid {
            return Err(ApiError::PermissionDenied("not owner".into()));
        }
    }
    Ok(team)
}

/// Membership assignment: the team lands in the oldest forming league, or a
/// fresh one.
async fn assign_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<AssignRequest>,
) -> ApiResult<Json<Value>> {
    let team = owned_team(&state, &headers, &payload.team_id)?;
    let capacity = state.config.league_capacity;
    let store = state.store.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        super::assign_team(&store, capacity, &team.id, &team.name, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("assign task panicked: {}", e)))??;
    Ok(Json(json!({
        "ok": true,
        "leagueId": outcome.league_id,
        "state": outcome.state,
    })))
}

/// Slot assignment: the team claims a free filler seat in the oldest open
/// bot-filled league.
async fn assign_slot_action(
    State(state): State<AppData>,
    headers: HeaderMap,
    Json(payload): Json<AssignRequest>,
) -> ApiResult<Json<Value>> {
    let team = owned_team(&state, &headers, &payload.team_id)?;
    let store = state.store.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        super::slot::assign_into_bot_slot(&store, &team.id, &team.name, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("assign task panicked: {}", e)))??;
    Ok(Json(json!({
        "ok": true,
        "leagueId": outcome.league_id,
        "slotIndex": outcome.slot_index,
        "alreadyAssigned": outcome.already_assigned,
    })))
}

/// Secret-guarded bulk backfill: assigns every human team that is not yet a
/// member anywhere. Per-item failures are reported, not fatal.
async fn assign_all_action(
    State(state): State<AppData>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    let capacity = state.config.league_capacity;
    let store = state.store.clone();
    let details = tokio::task::spawn_blocking(move || {
        let teams = store.teams.scan(|_, t| !t.is_bot);
        let mut details = Vec::with_capacity(teams.len());
        for (_, team) in teams {
            let entry = match super::assign_team(&store, capacity, &team.id, &team.name, Utc::now())
            {
                Ok(outcome) => json!({
                    "teamId": team.id,
                    "leagueId": outcome.league_id,
                    "state": outcome.state,
                }),
                Err(e) => json!({ "teamId": team.id, "error": e.to_string() }),
            };
            details.push(entry);
        }
        details
    })
    .await
    .map_err(|e| ApiError::Internal(format!("bulk assign task panicked: {}", e)))?;
    Ok(Json(json!({ "ok": true, "assigned": details.len(), "details": details })))
}

/// Canonical-slot sweep over duplicated memberships.
async fn dedup_action(
    State(state): State<AppData>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    auth::require_secret(&headers, state.config.admin_secret.as_deref())?;
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        super::dedup::dedup_slot_memberships(&store, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("dedup task panicked: {}", e)))??;
    Ok(Json(json!({
        "ok": true,
        "teamsWithDuplicates": report.teams_with_duplicates,
        "demotedSlots": report.demoted_slots,
        "fixturesRewritten": report.fixtures_rewritten,
    })))
}

pub fn routes() -> Router<AppData> {
    Router::new()
        .route("/api/assign", post(assign_action))
        .route("/api/assign/slot", post(assign_slot_action))
        .route("/api/admin/assign-all", post(assign_all_action))
        .route("/api/admin/dedup-slots", post(dedup_action))
}
