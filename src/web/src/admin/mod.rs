pub mod routes;

use crate::assign::slot::rewrite_slot_team;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use league_core::league::{Fixture, LeagueState};
use league_core::schedule::{RoundRobinMode, calendar, generate_slot_pairings};
use league_core::utils::{IdUtils, rng};
use log::{error, info, warn};
use serde::Serialize;
use store::bootstrap::{BotTeamSpec, ensure_bot_team, materialize_bot_teams};
use store::{BulkWriter, Store, StoreError, fixture_key, indexes, membership_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantSource {
    Slots,
    Memberships,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub league_id: String,
    pub created: usize,
    pub deleted: usize,
    pub rounds: u32,
    pub start_date: DateTime<Utc>,
    pub source: ParticipantSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct SlotInfo {
    slot_index: u32,
    team_id: Option<String>,
    bot_id: Option<String>,
}

/// Participants come from the slot table when present, falling back to the
/// membership mirror for leagues built by the assignment path.
fn load_participants(
    store: &Store,
    league_id: &str,
) -> Result<(Vec<SlotInfo>, ParticipantSource), ApiError> {
    let slots = match store.slots.query_ordered(
        |_, s| s.league_id == league_id,
        |s| s.slot_index,
        indexes::SLOTS_INDEX,
    ) {
        Ok(rows) => rows,
        Err(StoreError::MissingIndex { collection, index }) => {
            warn!("index {} missing on {}; scanning slots unordered", index, collection);
            let mut rows = store.slots.scan(|_, s| s.league_id == league_id);
            rows.sort_by_key(|(_, s)| s.slot_index);
            rows
        }
        Err(e) => return Err(e.into()),
    };
    if !slots.is_empty() {
        let infos = slots
            .into_iter()
            .map(|(_, s)| SlotInfo {
                slot_index: s.slot_index,
                team_id: s.team_id().map(str::to_string),
                bot_id: s.bot_id().map(str::to_string),
            })
            .collect();
        return Ok((infos, ParticipantSource::Slots));
    }

    let mut members = store.memberships.scan(|_, m| m.league_id == league_id);
    members.sort_by(|a, b| (a.1.joined_at, &a.1.team_id).cmp(&(b.1.joined_at, &b.1.team_id)));
    let infos = members
        .into_iter()
        .enumerate()
        .map(|(idx, (_, m))| SlotInfo {
            slot_index: (idx + 1) as u32,
            team_id: Some(m.team_id),
            bot_id: None,
        })
        .collect();
    Ok((infos, ParticipantSource::Memberships))
}

/// An odd field gets one synthetic filler so the calendar template stays
/// even.
fn ensure_even_slots(mut slots: Vec<SlotInfo>) -> Vec<SlotInfo> {
    if slots.len() % 2 == 1 {
        let filler_index = slots.iter().map(|s| s.slot_index).max().unwrap_or(0) + 1;
        slots.push(SlotInfo {
            slot_index: filler_index,
            team_id: None,
            bot_id: Some(format!("bot-auto-{}", filler_index)),
        });
    }
    slots
}

fn delete_league_fixtures(store: &Store, league_id: &str) -> usize {
    let existing = store.fixtures.scan(|_, f| f.league_id == league_id);
    let mut bulk = BulkWriter::new(store);
    for (key, _) in existing {
        bulk.delete(&store.fixtures, &key);
    }
    bulk.finish()
}

/// Full calendar rebuild for one league: wipe (unless `force` is off),
/// regenerate the double round robin over the current participant set, and
/// refresh the league's round count. Dry-run reports without writing.
pub fn rebuild_fixtures(
    store: &Store,
    league_id: &str,
    force: bool,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<RebuildReport, ApiError> {
    let league = store
        .leagues
        .get(league_id)
        .ok_or_else(|| ApiError::NotFound(format!("league {} not found", league_id)))?;

    let (raw_slots, source) = load_participants(store, league_id)?;
    if raw_slots.len() < 2 {
        return Err(ApiError::FailedPrecondition(
            "at least two slots required".into(),
        ));
    }
    let slots = ensure_even_slots(raw_slots);

    // Materialize filler teams so rebuilt fixtures can embed concrete ids.
    let bot_specs: Vec<BotTeamSpec> = slots
        .iter()
        .filter(|s| s.team_id.is_none() && s.bot_id.is_some())
        .map(|s| BotTeamSpec {
            bot_id: s.bot_id.clone().expect("filtered to bot slots"),
            name: None,
            rating: None,
            slot_index: Some(s.slot_index),
        })
        .collect();
    let bot_team_ids = materialize_bot_teams(store, &bot_specs, now);
    let mut bot_iter = bot_team_ids.into_iter();
    let resolved: Vec<SlotInfo> = slots
        .into_iter()
        .map(|mut s| {
            if s.team_id.is_none() && s.bot_id.is_some() {
                s.team_id = bot_iter.next();
            }
            s
        })
        .collect();

    let template = generate_slot_pairings(resolved.len(), RoundRobinMode::Double);
    if template.is_empty() {
        return Err(ApiError::FailedPrecondition(
            "unable to build a fixture template".into(),
        ));
    }
    let rounds = template.last().map(|p| p.round).unwrap_or(0);
    let start_date = league
        .start_date
        .unwrap_or_else(|| calendar::next_day_kickoff(now));

    let deleted = if force && !dry_run {
        delete_league_fixtures(store, league_id)
    } else {
        0
    };

    if dry_run {
        return Ok(RebuildReport {
            league_id: league_id.to_string(),
            created: 0,
            deleted,
            rounds,
            start_date,
            source,
            error: None,
        });
    }

    let mut bulk = BulkWriter::new(store);
    let mut created = 0;
    for pairing in &template {
        // Template slots are positional; map them back onto the real indices.
        let home = &resolved[(pairing.home_slot - 1) as usize];
        let away = &resolved[(pairing.away_slot - 1) as usize];
        let match_id = IdUtils::new_id();
        let fixture = Fixture::new(
            match_id.clone(),
            league_id.to_string(),
            pairing.round,
            calendar::date_for_round(start_date, pairing.round),
            rng::fnv1a64(&match_id),
        )
        .with_slots(home.slot_index, away.slot_index)
        .with_teams(home.team_id.clone(), away.team_id.clone());
        bulk.put(&store.fixtures, &fixture_key(league_id, &match_id), fixture);
        created += 1;
    }
    bulk.finish();

    if league.rounds != rounds {
        let mut updated = league;
        updated.rounds = rounds;
        store.leagues.put(league_id, updated);
    }

    info!(
        "fixtures rebuilt for league {}: {} created, {} deleted, {} rounds",
        league_id, created, deleted, rounds
    );

    Ok(RebuildReport {
        league_id: league_id.to_string(),
        created,
        deleted,
        rounds,
        start_date,
        source,
        error: None,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildAllReport {
    pub processed: usize,
    pub reports: Vec<RebuildReport>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub const REBUILD_PAGE_DEFAULT: usize = 20;
pub const REBUILD_PAGE_MAX: usize = 50;

/// Paged bulk rebuild over leagues in the given states. One league failing
/// lands in its report entry and never aborts the rest of the batch.
pub fn rebuild_all_fixtures(
    store: &Store,
    states: &[LeagueState],
    cursor: Option<&str>,
    limit: Option<usize>,
    force: bool,
    now: DateTime<Utc>,
) -> RebuildAllReport {
    let limit = limit
        .unwrap_or(REBUILD_PAGE_DEFAULT)
        .clamp(1, REBUILD_PAGE_MAX);

    let mut league_ids: Vec<String> = store
        .leagues
        .scan(|_, l| states.contains(&l.state))
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    league_ids.sort();
    if let Some(cursor) = cursor {
        league_ids.retain(|id| id.as_str() > cursor);
    }
    let has_more = league_ids.len() > limit;
    league_ids.truncate(limit);

    let mut reports = Vec::with_capacity(league_ids.len());
    for league_id in &league_ids {
        match rebuild_fixtures(store, league_id, force, false, now) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("rebuild failed for league {}: {}", league_id, e);
                reports.push(RebuildReport {
                    league_id: league_id.clone(),
                    created: 0,
                    deleted: 0,
                    rounds: 0,
                    start_date: now,
                    source: ParticipantSource::Slots,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    RebuildAllReport {
        processed: reports.len(),
        next_cursor: if has_more {
            league_ids.last().cloned()
        } else {
            None
        },
        has_more,
        reports,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonResetReport {
    pub league_id: String,
    pub season: u32,
    pub start_date: DateTime<Utc>,
    pub fixtures: usize,
}

/// The one sanctioned way backwards in the lifecycle: an administrative
/// season reset. The league returns to `scheduled` with a fresh kickoff,
/// every standing is zeroed in place, and the calendar is wiped and rebuilt
/// from the current participant set.
pub fn reset_league_season(
    store: &Store,
    league_id: &str,
    now: DateTime<Utc>,
) -> Result<SeasonResetReport, ApiError> {
    let mut league = store
        .leagues
        .get(league_id)
        .ok_or_else(|| ApiError::NotFound(format!("league {} not found", league_id)))?;

    let start_date = calendar::next_month_or_this_month_kickoff(now);
    let month_key = calendar::month_key(start_date);
    league.season += 1;
    league.reset_season(start_date, month_key, league.rounds);
    let season = league.season;
    store.leagues.put(league_id, league);

    let standings = store.standings.scan(|_, s| s.league_id == league_id);
    let mut bulk = BulkWriter::new(store);
    for (key, row) in standings {
        let zeroed = league_core::Standing::zeroed(
            row.league_id,
            row.key,
            row.slot_index,
            row.team_id,
            row.name,
        );
        bulk.put(&store.standings, &key, zeroed);
    }
    bulk.finish();

    let rebuilt = rebuild_fixtures(store, league_id, true, false, now)?;
    info!(
        "season reset for league {}: season {}, {} fixtures",
        league_id, season, rebuilt.created
    );

    Ok(SeasonResetReport {
        league_id: league_id.to_string(),
        season,
        start_date,
        fixtures: rebuilt.created,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub had_team: bool,
    pub league_id: Option<String>,
    pub slot_index: Option<u32>,
    pub fixtures_rewritten: usize,
}

/// Administrative removal of a team: the team doc goes away, its seat
/// returns to a filler, its standings rows are detached and its membership
/// mirrors deleted, all in one transaction. The fixture fan-out is rewritten
/// afterwards in chunks.
pub fn cleanup_team(
    store: &Store,
    team_id: &str,
    now: DateTime<Utc>,
) -> Result<CleanupReport, ApiError> {
    struct TxReport {
        had_team: bool,
        league_id: Option<String>,
        slot_index: Option<u32>,
        filler_bot: Option<String>,
    }

    let outcome = store.run(|tx| {
        let Some(team) = tx.get(&store.teams, team_id)? else {
            return Ok(TxReport {
                had_team: false,
                league_id: None,
                slot_index: None,
                filler_bot: None,
            });
        };
        let league_id = team.league_id.clone();

        let mut slot_row = None;
        let mut standing_rows = Vec::new();
        let mut membership_id = None;
        if let Some(league_id) = &league_id {
            let held = tx.scan(&store.slots, |_, s| {
                s.league_id == *league_id && s.team_id() == Some(team_id)
            })?;
            slot_row = held.into_iter().next();
            standing_rows = tx.scan(&store.standings, |_, st| {
                st.league_id == *league_id && st.team_id.as_deref() == Some(team_id)
            })?;
            let m_key = membership_key(league_id, team_id);
            if tx.get(&store.memberships, &m_key)?.is_some() {
                membership_id = Some(m_key);
            }
        }

        tx.delete(&store.teams, team_id);

        let mut slot_index = None;
        let mut filler_bot = None;
        if let Some((slot_key, mut slot)) = slot_row {
            slot_index = Some(slot.slot_index);
            let fallback = slot
                .bot_id()
                .map(str::to_string)
                .unwrap_or_else(|| format!("cleanup-bot-{}", slot.slot_index));
            slot.demote_to_bot(fallback.clone(), now);
            filler_bot = Some(fallback);
            tx.put(&store.slots, &slot_key, slot);
        }
        for (key, mut row) in standing_rows {
            row.team_id = None;
            if row.name.is_empty() {
                row.name = match slot_index {
                    Some(idx) => format!("Bot {}", idx),
                    None => "Open Slot".to_string(),
                };
            }
            tx.put(&store.standings, &key, row);
        }
        if let Some(m_key) = membership_id {
            tx.delete(&store.memberships, &m_key);
        }

        Ok(TxReport {
            had_team: true,
            league_id,
            slot_index,
            filler_bot,
        })
    })?;

    let mut fixtures_rewritten = 0;
    if let (Some(league_id), Some(slot_index)) = (&outcome.league_id, outcome.slot_index) {
        let replacement = outcome
            .filler_bot
            .as_deref()
            .map(|bot| ensure_bot_team(store, bot, Some(slot_index), now));
        fixtures_rewritten = rewrite_slot_team(store, league_id, slot_index, replacement);
    }

    if outcome.had_team {
        info!(
            "team {} cleaned up (league {:?}, slot {:?}, {} fixtures rewritten)",
            team_id, outcome.league_id, outcome.slot_index, fixtures_rewritten
        );
    }

    Ok(CleanupReport {
        had_team: outcome.had_team,
        league_id: outcome.league_id,
        slot_index: outcome.slot_index,
        fixtures_rewritten,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bot_league, team_doc};
    use chrono::TimeZone;
    use store::slot_key;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rebuild_replaces_calendar() {
        let store = Store::new();
        let league_id = bot_league(&store, "lg1", 4);
        let before = store.fixtures.scan(|_, f| f.league_id == league_id).len();
        assert_eq!(before, 12); // double round robin over 4

        let report = rebuild_fixtures(&store, &league_id, true, false, now()).unwrap();
        assert_eq!(report.deleted, 12);
        assert_eq!(report.created, 12);
        assert_eq!(report.rounds, 6);
        assert_eq!(report.source, ParticipantSource::Slots);

        let after = store.fixtures.scan(|_, f| f.league_id == league_id);
        assert_eq!(after.len(), 12);
        // Rebuilt fixtures embed the materialized filler team ids.
        for (_, fx) in &after {
            assert!(fx.home_team_id.is_some());
            assert!(fx.away_team_id.is_some());
        }
    }

    #[test]
    fn test_rebuild_dry_run_touches_nothing() {
        let store = Store::new();
        let league_id = bot_league(&store, "lg1", 4);
        let before: Vec<String> = store
            .fixtures
            .scan(|_, f| f.league_id == league_id)
            .into_iter()
            .map(|(k, _)| k)
            .collect();

        let report = rebuild_fixtures(&store, &league_id, true, true, now()).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.rounds, 6);

        let after: Vec<String> = store
            .fixtures
            .scan(|_, f| f.league_id == league_id)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rebuild_missing_league_is_not_found() {
        let store = Store::new();
        let err = rebuild_fixtures(&store, "ghost", true, false, now()).unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[test]
    fn test_rebuild_all_reports_per_item() {
        let store = Store::new();
        bot_league(&store, "lg1", 4);
        bot_league(&store, "lg2", 4);

        let report = rebuild_all_fixtures(
            &store,
            &[LeagueState::Scheduled, LeagueState::Active],
            None,
            Some(1),
            true,
            now(),
        );
        assert_eq!(report.processed, 1);
        assert!(report.has_more);
        let cursor = report.next_cursor.clone().unwrap();

        let rest = rebuild_all_fixtures(
            &store,
            &[LeagueState::Scheduled, LeagueState::Active],
            Some(&cursor),
            Some(10),
            true,
            now(),
        );
        assert_eq!(rest.processed, 1);
        assert!(!rest.has_more);
    }

    #[test]
    fn test_cleanup_demotes_slot_and_rewrites_fixtures() {
        let store = Store::new();
        let league_id = bot_league(&store, "lg1", 5);
        team_doc(&store, "human-1");
        crate::assign::slot::assign_into_bot_slot(&store, "human-1", "H", now()).unwrap();
        let slot_index = store
            .slots
            .scan(|_, s| s.team_id() == Some("human-1"))
            .pop()
            .unwrap()
            .1
            .slot_index;

        let report = cleanup_team(&store, "human-1", now()).unwrap();
        assert!(report.had_team);
        assert_eq!(report.league_id.as_deref(), Some(league_id.as_str()));
        assert_eq!(report.slot_index, Some(slot_index));
        assert!(report.fixtures_rewritten > 0);

        assert!(store.teams.get("human-1").is_none());
        let slot = store.slots.get(&slot_key(&league_id, slot_index)).unwrap();
        assert!(slot.is_free_bot());
        // No fixture references the removed team anymore.
        let orphaned = store
            .fixtures
            .scan(|_, f| f.participants.contains(&"human-1".to_string()));
        assert!(orphaned.is_empty());
    }

    #[test]
    fn test_cleanup_unknown_team_reports_absence() {
        let store = Store::new();
        let report = cleanup_team(&store, "nobody", now()).unwrap();
        assert!(!report.had_team);
    }

    #[test]
    fn test_season_reset_rewinds_league_and_standings() {
        let store = Store::new();
        let league_id = bot_league(&store, "lg1", 4);

        // A finished season: completed league, non-zero standings.
        let mut league = store.leagues.get(&league_id).unwrap();
        league.state = LeagueState::Completed;
        store.leagues.put(&league_id, league);
        let st_key = store::standing_key(&league_id, "1");
        let mut row = store.standings.get(&st_key).unwrap();
        row.record_result(3, 1);
        store.standings.put(&st_key, row);

        let report = reset_league_season(&store, &league_id, now()).unwrap();
        assert_eq!(report.season, 2);
        assert_eq!(report.fixtures, 12);

        let league = store.leagues.get(&league_id).unwrap();
        assert_eq!(league.state, LeagueState::Scheduled);
        assert_eq!(league.season, 2);
        let row = store.standings.get(&st_key).unwrap();
        assert_eq!((row.played, row.points), (0, 0));
        assert_eq!(
            store.fixtures.scan(|_, f| f.league_id == league_id).len(),
            12
        );
    }
}
