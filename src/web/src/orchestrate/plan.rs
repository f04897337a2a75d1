use crate::error::ApiError;
use league_core::league::Fixture;
use league_core::r#match::{MatchPlan, MatchSpec, PlanSide};
use league_core::utils::rng;
use chrono::{DateTime, Utc};
use store::{Store, StoreError};

/// Reference used for a side whose slot has no materialized team yet.
fn side_label(team_id: &Option<String>, slot: Option<u32>) -> String {
    match team_id {
        Some(id) => id.clone(),
        None => format!("slot-{}", slot.unwrap_or(0)),
    }
}

/// Freezes both lineups into the immutable plan record, create-if-absent.
/// Later roster edits cannot change a match already in flight; if a
/// concurrent starter won the create race, its snapshot wins.
pub fn ensure_match_plan(
    store: &Store,
    fixture: &Fixture,
    now: DateTime<Utc>,
) -> Result<MatchPlan, ApiError> {
    if let Some(existing) = store.match_plans.get(&fixture.id) {
        return Ok(existing);
    }

    let season_id = store
        .leagues
        .get(&fixture.league_id)
        .map(|l| l.season_id())
        .unwrap_or_else(|| "S1".to_string());

    let home_label = side_label(&fixture.home_team_id, fixture.home_slot);
    let away_label = side_label(&fixture.away_team_id, fixture.away_slot);
    let home_team = fixture.home_team_id.as_deref().and_then(|id| store.teams.get(id));
    let away_team = fixture.away_team_id.as_deref().and_then(|id| store.teams.get(id));

    let plan = MatchPlan {
        match_id: fixture.id.clone(),
        league_id: fixture.league_id.clone(),
        season_id,
        rng_seed: fixture.seed.unwrap_or_else(|| {
            rng::fnv1a64(&format!("{}:{}", fixture.league_id, fixture.id))
        }),
        kickoff_utc: fixture.date,
        created_at: now,
        home: PlanSide::from_team(&home_label, home_team.as_ref()),
        away: PlanSide::from_team(&away_label, away_team.as_ref()),
    };

    match store.match_plans.create(&fixture.id, plan.clone()) {
        Ok(()) => Ok(plan),
        Err(StoreError::AlreadyExists { .. }) => Ok(store
            .match_plans
            .get(&fixture.id)
            .unwrap_or(plan)),
        Err(e) => Err(e.into()),
    }
}

/// Serializes the plan into the engine wire schema, enriching player entries
/// from the current rosters. Enrichment is advisory; a vanished roster just
/// yields bare pids.
pub fn build_spec(store: &Store, plan: &MatchPlan) -> MatchSpec {
    let home_roster = store.teams.get(&plan.home.team_id);
    let away_roster = store.teams.get(&plan.away.team_id);
    MatchSpec::build(plan, home_roster.as_ref(), away_roster.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use league_core::bots;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap()
    }

    fn fixture_with_teams(store: &Store) -> Fixture {
        let home = bots::synthesize_team("bot-h", "Home", Some(70), now());
        let away = bots::synthesize_team("bot-a", "Away", Some(60), now());
        store.teams.put(&home.id.clone(), home.clone());
        store.teams.put(&away.id.clone(), away.clone());
        Fixture::new("m1".into(), "lg1".into(), 1, now(), 77)
            .with_teams(Some(home.id), Some(away.id))
    }

    #[test]
    fn test_plan_created_once() {
        let store = Store::new();
        let fx = fixture_with_teams(&store);
        let first = ensure_match_plan(&store, &fx, now()).unwrap();
        assert_eq!(first.rng_seed, 77);
        assert_eq!(first.home.starters.len(), 11);

        // A roster edit after dispatch must not leak into the frozen plan.
        let mut edited = store.teams.get("botteam-bot-h").unwrap();
        if let Some(lineup) = edited.lineup.as_mut() {
            lineup.starters.truncate(5);
        }
        store.teams.put("botteam-bot-h", edited);

        let second = ensure_match_plan(&store, &fx, now()).unwrap();
        assert_eq!(second, first);
        assert_eq!(second.home.starters.len(), 11);
        assert_eq!(store.match_plans.len(), 1);
    }

    #[test]
    fn test_plan_for_unmaterialized_slot() {
        let store = Store::new();
        let fx = Fixture::new("m2".into(), "lg1".into(), 1, now(), 0).with_slots(3, 9);
        let plan = ensure_match_plan(&store, &fx, now()).unwrap();
        assert_eq!(plan.home.team_id, "slot-3");
        assert!(plan.home.starters.is_empty());
        // seed 0 is still a seed; the fallback hash only covers a missing one
        assert_eq!(plan.rng_seed, 0);
    }
}
