use crate::error::ApiError;
use chrono::{DateTime, Utc};
use league_core::league::{LeagueState, Standing};
use log::{info, warn};
use rand::RngExt;
use serde::Serialize;
use store::{BulkWriter, Store, StoreError, indexes, slot_key, standing_key};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssignOutcome {
    pub league_id: String,
    pub slot_index: Option<u32>,
    pub already_assigned: bool,
}

enum SlotTxResult {
    Assigned,
    Already(String),
    TeamMissing,
    SlotMissing,
    SlotTaken,
}

/// A free filler seat to offer the next joiner: oldest open league first,
/// random free slot within it.
fn choose_free_bot_slot(store: &Store) -> Option<(String, u32)> {
    let open_states = [LeagueState::Forming, LeagueState::Scheduled];
    let leagues = match store.leagues.query_ordered(
        |_, l| open_states.contains(&l.state),
        |l| l.created_at,
        indexes::LEAGUES_STATE_CREATED_AT,
    ) {
        Ok(rows) => rows,
        Err(StoreError::MissingIndex { collection, index }) => {
            warn!(
                "index {} missing on {}; choosing league unordered",
                index, collection
            );
            store.leagues.scan(|_, l| open_states.contains(&l.state))
        }
        Err(e) => {
            warn!("league lookup failed while choosing a slot: {}", e);
            return None;
        }
    };

    let mut rng = rand::rng();
    for (league_id, _) in leagues {
        let mut free: Vec<u32> = store
            .slots
            .scan(|_, s| s.league_id == league_id && s.is_free_bot())
            .into_iter()
            .map(|(_, s)| s.slot_index)
            .collect();
        free.sort_unstable();
        if free.is_empty() {
            continue;
        }
        let pick = free[rng.random_range(0..free.len())];
        return Some((league_id, pick));
    }
    None
}

/// Slot-based admission for fixed-size bot-filled leagues: swaps a filler
/// occupant for the human team in one transaction, then rewrites that slot's
/// fixture references outside it. The candidate slot is picked outside the
/// transaction and re-validated inside; losing the race surfaces as a
/// precondition failure, not a corrupted seat.
pub fn assign_into_bot_slot(
    store: &Store,
    team_id: &str,
    team_name: &str,
    now: DateTime<Utc>,
) -> Result<SlotAssignOutcome, ApiError> {
    let chosen = choose_free_bot_slot(store);

    let result = store.run(|tx| {
        let Some(mut team) = tx.get(&store.teams, team_id)? else {
            return Ok(SlotTxResult::TeamMissing);
        };
        if let Some(existing) = team.league_id.clone() {
            return Ok(SlotTxResult::Already(existing));
        }

        let Some((league_id, slot_index)) = chosen.clone() else {
            return Ok(SlotTxResult::SlotMissing);
        };
        let s_key = slot_key(&league_id, slot_index);
        let Some(mut slot) = tx.get(&store.slots, &s_key)? else {
            return Ok(SlotTxResult::SlotMissing);
        };
        if !slot.is_free_bot() {
            return Ok(SlotTxResult::SlotTaken);
        }
        let st_key = standing_key(&league_id, &slot_index.to_string());
        let standing = tx.get(&store.standings, &st_key)?;

        slot.claim(team_id.to_string(), now);
        tx.put(&store.slots, &s_key, slot);

        let row = match standing {
            Some(mut row) => {
                row.team_id = Some(team_id.to_string());
                row.name = team_name.to_string();
                row
            }
            None => Standing::zeroed(
                league_id.clone(),
                slot_index.to_string(),
                Some(slot_index),
                Some(team_id.to_string()),
                team_name.to_string(),
            ),
        };
        tx.put(&store.standings, &st_key, row);

        team.league_id = Some(league_id.clone());
        team.updated_at = now;
        tx.put(&store.teams, team_id, team);

        Ok(SlotTxResult::Assigned)
    })?;

    match result {
        SlotTxResult::Assigned => {
            let (league_id, slot_index) = chosen.expect("assigned implies a chosen slot");
            let rewritten =
                rewrite_slot_team(store, &league_id, slot_index, Some(team_id.to_string()));
            info!(
                "team {} claimed slot {} in league {} ({} fixtures rewritten)",
                team_id, slot_index, league_id, rewritten
            );
            Ok(SlotAssignOutcome {
                league_id,
                slot_index: Some(slot_index),
                already_assigned: false,
            })
        }
        SlotTxResult::Already(league_id) => {
            // Resolve the seat for a friendly idempotent response.
            let slot_index = store
                .slots
                .scan(|_, s| s.league_id == league_id && s.team_id() == Some(team_id))
                .into_iter()
                .map(|(_, s)| s.slot_index)
                .next();
            Ok(SlotAssignOutcome {
                league_id,
                slot_index,
                already_assigned: true,
            })
        }
        SlotTxResult::TeamMissing => {
            Err(ApiError::NotFound(format!("team {} not found", team_id)))
        }
        SlotTxResult::SlotMissing => {
            Err(ApiError::ResourceExhausted("no available slot".into()))
        }
        SlotTxResult::SlotTaken => {
            Err(ApiError::FailedPrecondition("slot already taken".into()))
        }
    }
}

/// Rewrites every fixture referencing a slot to a new occupant team id
/// (or clears it), leaving rounds and the other side untouched. Chunked
/// batches; safe to re-run after a crash because each write is by id.
pub fn rewrite_slot_team(
    store: &Store,
    league_id: &str,
    slot_index: u32,
    new_team_id: Option<String>,
) -> usize {
    let affected = store.fixtures.scan(|_, f| {
        f.league_id == league_id
            && (f.home_slot == Some(slot_index) || f.away_slot == Some(slot_index))
    });

    let mut bulk = BulkWriter::new(store);
    for (key, mut fx) in affected {
        if fx.home_slot == Some(slot_index) {
            fx.home_team_id = new_team_id.clone();
        }
        if fx.away_slot == Some(slot_index) {
            fx.away_team_id = new_team_id.clone();
        }
        fx.refresh_participants();
        bulk.put(&store.fixtures, &key, fx);
    }
    bulk.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bot_league, team_doc};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_human_claims_bot_slot_and_fixtures_follow() {
        let store = Store::new();
        let league_id = bot_league(&store, "lg1", 15);
        team_doc(&store, "human-1");

        let outcome = assign_into_bot_slot(&store, "human-1", "The Humans", now()).unwrap();
        assert!(!outcome.already_assigned);
        assert_eq!(outcome.league_id, league_id);
        let slot_index = outcome.slot_index.unwrap();

        let slot = store.slots.get(&slot_key(&league_id, slot_index)).unwrap();
        assert_eq!(slot.team_id(), Some("human-1"));
        assert!(slot.locked_at.is_some());

        let standing = store
            .standings
            .get(&standing_key(&league_id, &slot_index.to_string()))
            .unwrap();
        assert_eq!(standing.team_id.as_deref(), Some("human-1"));
        assert_eq!(standing.name, "The Humans");
        assert_eq!(standing.played, 0);

        // Every fixture touching the claimed slot now references the human
        // team; rounds and the other slots are untouched.
        let all = store.fixtures.scan(|_, f| f.league_id == league_id);
        // double round robin over 15 padded to 16: each slot plays 28 matches
        let mine: Vec<_> = all
            .iter()
            .filter(|(_, f)| {
                f.home_slot == Some(slot_index) || f.away_slot == Some(slot_index)
            })
            .collect();
        assert_eq!(mine.len(), 28);
        for (_, fx) in &mine {
            if fx.home_slot == Some(slot_index) {
                assert_eq!(fx.home_team_id.as_deref(), Some("human-1"));
            } else {
                assert_eq!(fx.away_team_id.as_deref(), Some("human-1"));
            }
            assert!(fx.participants.contains(&"human-1".to_string()));
        }
        for (_, fx) in &all {
            if fx.home_slot != Some(slot_index) {
                assert_ne!(fx.home_team_id.as_deref(), Some("human-1"));
            }
        }

        assert_eq!(
            store.teams.get("human-1").unwrap().league_id.as_deref(),
            Some(league_id.as_str())
        );
    }

    #[test]
    fn test_second_claim_is_idempotent() {
        let store = Store::new();
        let league_id = bot_league(&store, "lg1", 5);
        team_doc(&store, "human-1");

        let first = assign_into_bot_slot(&store, "human-1", "H", now()).unwrap();
        let second = assign_into_bot_slot(&store, "human-1", "H", now()).unwrap();
        assert!(second.already_assigned);
        assert_eq!(second.league_id, league_id);
        assert_eq!(second.slot_index, first.slot_index);

        let humans = store
            .slots
            .scan(|_, s| s.team_id() == Some("human-1"));
        assert_eq!(humans.len(), 1);
    }

    #[test]
    fn test_unknown_team_is_rejected() {
        let store = Store::new();
        bot_league(&store, "lg1", 5);
        let err = assign_into_bot_slot(&store, "ghost", "G", now()).unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[test]
    fn test_full_world_is_resource_exhausted() {
        let store = Store::new();
        team_doc(&store, "human-1");
        let err = assign_into_bot_slot(&store, "human-1", "H", now()).unwrap_err();
        assert_eq!(err.code(), "resource-exhausted");
    }
}
