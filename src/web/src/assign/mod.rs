pub mod dedup;
pub mod routes;
pub mod slot;

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use league_core::league::{Fixture, League, LeagueState, Membership, Standing};
use league_core::schedule::{RoundRobinMode, calendar, generate_team_pairings};
use league_core::utils::{IdUtils, rng};
use log::{info, warn};
use serde::Serialize;
use store::{
    BulkWriter, Store, StoreError, Tx, fixture_key, indexes, membership_key, standing_key,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOutcome {
    pub league_id: String,
    pub state: LeagueState,
}

fn lifecycle_abort(e: league_core::LifecycleError) -> StoreError {
    StoreError::Aborted(e.to_string())
}

/// Prepares a fresh forming league; the write is deferred to the caller so
/// all transaction reads stay ahead of the first write.
fn prepare_forming_league<'s>(
    tx: &mut Tx<'s>,
    store: &'s Store,
    capacity: usize,
    now: DateTime<Utc>,
) -> Result<(String, League), StoreError> {
    let last_season = tx
        .scan(&store.leagues, |_, _| true)?
        .into_iter()
        .map(|(_, l)| l.season)
        .max()
        .unwrap_or(0);
    let season = last_season + 1;
    let id = IdUtils::new_id();
    let league = League::new(
        id.clone(),
        format!("League {}", season),
        season,
        capacity,
        calendar::LEAGUE_TIMEZONE.to_string(),
        now,
    );
    Ok((id, league))
}

/// Admits a team into an open league, creating a new one when the frontier
/// is full. One optimistic transaction, retried transparently on conflicts;
/// the capacity re-check at write time turns the last-seat race into a
/// silent retry instead of an oversubscribed league.
pub fn assign_team(
    store: &Store,
    capacity: usize,
    team_id: &str,
    team_name: &str,
    now: DateTime<Utc>,
) -> Result<AssignOutcome, ApiError> {
    let league_id = store.run(|tx| {
        // 1) Already a member somewhere? Idempotent fast path.
        let existing = tx.scan(&store.memberships, |_, m| m.team_id == team_id)?;
        if let Some((_, membership)) = existing.into_iter().next() {
            return Ok(membership.league_id);
        }

        // 2) Oldest forming league; a missing index degrades to an unordered
        //    pick rather than failing the call.
        let forming = match tx.query_ordered(
            &store.leagues,
            |_, l| l.state == LeagueState::Forming,
            |l| l.created_at,
            indexes::LEAGUES_STATE_CREATED_AT,
        ) {
            Ok(rows) => rows.into_iter().next(),
            Err(StoreError::MissingIndex { collection, index }) => {
                warn!(
                    "index {} missing on {}; picking a forming league unordered",
                    index, collection
                );
                tx.scan(&store.leagues, |_, l| l.state == LeagueState::Forming)?
                    .into_iter()
                    .next()
            }
            Err(e) => return Err(e),
        };

        // A full frontier league gets finalized in the same transaction the
        // newcomer lands in its successor.
        let mut finalize_old: Option<(String, League)> = None;
        let (target_id, mut target) = match forming {
            Some((id, league)) if league.team_count >= league.capacity => {
                let mut full = league;
                full.schedule_at(calendar::next_day_kickoff(now))
                    .map_err(lifecycle_abort)?;
                finalize_old = Some((id, full));
                prepare_forming_league(tx, store, capacity, now)?
            }
            Some((id, league)) => (id, league),
            None => prepare_forming_league(tx, store, capacity, now)?,
        };

        // 3) Idempotency on retries, then the capacity re-check at write
        //    time: two writers both read "one seat left", one must back off.
        let m_key = membership_key(&target_id, team_id);
        if tx.get(&store.memberships, &m_key)?.is_none() {
            if target.team_count >= target.capacity {
                return Err(StoreError::RetryRequested(format!(
                    "league {} filled between read and write",
                    target_id
                )));
            }

            if let Some((old_id, old)) = finalize_old.take() {
                tx.put(&store.leagues, &old_id, old);
            }
            tx.put(
                &store.memberships,
                &m_key,
                Membership {
                    league_id: target_id.clone(),
                    team_id: team_id.to_string(),
                    name: team_name.to_string(),
                    joined_at: now,
                },
            );
            tx.put(
                &store.standings,
                &standing_key(&target_id, team_id),
                Standing::zeroed(
                    target_id.clone(),
                    team_id.to_string(),
                    None,
                    Some(team_id.to_string()),
                    team_name.to_string(),
                ),
            );

            target.team_count += 1;
            if target.team_count == target.capacity {
                target
                    .schedule_at(calendar::next_day_kickoff(now))
                    .map_err(lifecycle_abort)?;
            }
            tx.put(&store.leagues, &target_id, target);
        }

        Ok(target_id)
    })?;

    let league = store
        .leagues
        .get(&league_id)
        .ok_or_else(|| ApiError::Internal(format!("league {} vanished after assign", league_id)))?;

    // Post-commit, exactly-once calendar build for a league that just filled.
    if league.state == LeagueState::Scheduled {
        let has_fixtures = store
            .fixtures
            .scan(|_, f| f.league_id == league_id)
            .first()
            .is_some();
        if !has_fixtures {
            let created = generate_membership_fixtures(store, &league)?;
            info!(
                "calendar built for league {}: {} fixtures",
                league_id, created
            );
        }
    }

    Ok(AssignOutcome {
        league_id,
        state: league.state,
    })
}

/// Builds the single round-robin calendar for a membership league, one round
/// per local day from the start date. Idempotent per league via the caller's
/// fixtures-exist guard; the writes themselves are chunked.
pub fn generate_membership_fixtures(store: &Store, league: &League) -> Result<usize, ApiError> {
    let start = league.start_date.ok_or_else(|| {
        ApiError::FailedPrecondition(format!("league {} has no start date", league.id))
    })?;

    let mut members = store.memberships.scan(|_, m| m.league_id == league.id);
    members.sort_by(|a, b| {
        (a.1.joined_at, &a.1.team_id).cmp(&(b.1.joined_at, &b.1.team_id))
    });
    let team_ids: Vec<String> = members.into_iter().map(|(_, m)| m.team_id).collect();

    let pairings = generate_team_pairings(&team_ids, RoundRobinMode::Single);
    let mut bulk = BulkWriter::new(store);
    for pairing in &pairings {
        let match_id = IdUtils::new_id();
        let fixture = Fixture::new(
            match_id.clone(),
            league.id.clone(),
            pairing.round,
            calendar::date_for_round(start, pairing.round),
            rng::fnv1a64(&match_id),
        )
        .with_teams(
            Some(pairing.home_team_id.clone()),
            Some(pairing.away_team_id.clone()),
        );
        bulk.put(&store.fixtures, &fixture_key(&league.id, &match_id), fixture);
    }
    Ok(bulk.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::team_doc;
    use league_core::league::FixtureStatus;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_four_teams_fill_a_capacity_four_league() {
        let store = Store::new();
        for name in ["A", "B", "C", "D"] {
            team_doc(&store, name);
            let outcome = assign_team(&store, 4, name, name, now()).unwrap();
            let league = store.leagues.get(&outcome.league_id).unwrap();
            if name == "D" {
                assert_eq!(league.state, LeagueState::Scheduled);
            } else {
                assert_eq!(league.state, LeagueState::Forming);
            }
        }

        assert_eq!(store.leagues.len(), 1);
        let (league_id, league) = store.leagues.scan(|_, _| true).pop().unwrap();
        assert_eq!(league.team_count, 4);
        assert_eq!(league.state, LeagueState::Scheduled);
        assert!(league.start_date.is_some());

        // N=4 single round robin: 3 rounds x 2 matches.
        let fixtures = store.fixtures.scan(|_, f| f.league_id == league_id);
        assert_eq!(fixtures.len(), 6);
        let max_round = fixtures.iter().map(|(_, f)| f.round).max().unwrap();
        assert_eq!(max_round, 3);
        for (_, fx) in &fixtures {
            assert_eq!(fx.status, FixtureStatus::Scheduled);
            assert!(fx.seed.is_some());
        }
        // Standings initialized to zero for every member.
        assert_eq!(store.standings.len(), 4);
    }

    #[test]
    fn test_assign_twice_is_idempotent() {
        let store = Store::new();
        team_doc(&store, "A");
        let first = assign_team(&store, 4, "A", "A", now()).unwrap();
        let second = assign_team(&store, 4, "A", "A", now()).unwrap();
        assert_eq!(first.league_id, second.league_id);
        let league = store.leagues.get(&first.league_id).unwrap();
        assert_eq!(league.team_count, 1);
        assert_eq!(store.memberships.len(), 1);
    }

    #[test]
    fn test_two_team_league_single_round() {
        let store = Store::new();
        team_doc(&store, "A");
        team_doc(&store, "B");
        assign_team(&store, 2, "A", "A", now()).unwrap();
        let outcome = assign_team(&store, 2, "B", "B", now()).unwrap();
        assert_eq!(outcome.state, LeagueState::Scheduled);

        let fixtures = store.fixtures.scan(|_, _| true);
        assert_eq!(fixtures.len(), 1);
        let (_, fx) = &fixtures[0];
        assert_eq!(fx.round, 1);
        assert_eq!(fx.home_team_id.as_deref(), Some("A"));
        assert_eq!(fx.away_team_id.as_deref(), Some("B"));
    }

    #[test]
    fn test_concurrent_assigns_respect_capacity() {
        let store = Arc::new(Store::new());
        let capacity = 4usize;
        let occupants: Vec<String> = (0..capacity * 2).map(|i| format!("team-{}", i)).collect();
        for id in &occupants {
            team_doc(&store, id);
        }

        std::thread::scope(|scope| {
            for id in &occupants {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    assign_team(&store, capacity, id, id, now()).unwrap();
                });
            }
        });

        // 2 x capacity occupants never need more than 2 leagues.
        let leagues = store.leagues.scan(|_, _| true);
        assert!(leagues.len() <= 2, "got {} leagues", leagues.len());
        for (_, league) in &leagues {
            assert!(league.team_count <= capacity);
        }
        let total: usize = leagues.iter().map(|(_, l)| l.team_count).sum();
        assert_eq!(total, occupants.len());

        // Every occupant holds exactly one membership.
        let mut per_team: HashMap<String, usize> = HashMap::new();
        for (_, m) in store.memberships.scan(|_, _| true) {
            *per_team.entry(m.team_id).or_insert(0) += 1;
        }
        assert_eq!(per_team.len(), occupants.len());
        assert!(per_team.values().all(|&n| n == 1));
    }

    #[test]
    fn test_assign_works_without_ordered_index() {
        let store = Store::new_without_indexes();
        team_doc(&store, "A");
        let outcome = assign_team(&store, 4, "A", "A", now()).unwrap();
        assert_eq!(store.leagues.get(&outcome.league_id).unwrap().team_count, 1);
    }
}
