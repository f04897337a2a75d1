pub mod routes;

use crate::error::ApiError;
use crate::{AppData, orchestrate};
use chrono::{DateTime, Utc};
use league_core::league::{FixtureStatus, Score, Standing};
use league_core::r#match::{GoalEvent, timeline};
use league_core::utils::rng;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use store::{Store, StoreError, fixture_key, indexes, standing_key};

/// Accepts the score shapes that have existed historically:
/// `{score:{home,away}}`, `{score:{h,a}}` and `{result:{homeGoals,awayGoals}}`.
/// The union never travels past this boundary.
pub fn normalize_score(payload: &Value) -> Option<Score> {
    let pair = |obj: &Value, home: &str, away: &str| -> Option<Score> {
        match (obj.get(home)?.as_u64(), obj.get(away)?.as_u64()) {
            (Some(h), Some(a)) => Some(Score::new(h as u32, a as u32)),
            _ => None,
        }
    };
    if let Some(score) = payload.get("score") {
        if let Some(s) = pair(score, "home", "away") {
            return Some(s);
        }
        if let Some(s) = pair(score, "h", "a") {
            return Some(s);
        }
    }
    if let Some(result) = payload.get("result") {
        if let Some(s) = pair(result, "homeGoals", "awayGoals") {
            return Some(s);
        }
        if let Some(s) = pair(result, "home", "away") {
            return Some(s);
        }
    }
    None
}

/// `results/{season}/{league}/{match}.json` back into its ids.
pub fn parse_result_path(path: &str) -> Option<(String, String, String)> {
    let rest = path.strip_prefix("results/")?;
    let mut parts = rest.split('/');
    let season = parts.next()?;
    let league = parts.next()?;
    let file = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let match_id = file.strip_suffix(".json")?;
    if season.is_empty() || league.is_empty() || match_id.is_empty() {
        return None;
    }
    Some((season.to_string(), league.to_string(), match_id.to_string()))
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub already_played: bool,
    pub league_completed: bool,
}

enum FinalizeGuard {
    Missing,
    Already,
    Applied,
}

/// The one atomic settlement step both trigger shapes funnel into: fixture to
/// `played`, both standings rows updated under the 3/1/0 rule. A duplicate or
/// stale delivery finds the fixture already played and is a success no-op;
/// this status guard is what keeps every standing incremented exactly once
/// per match.
pub fn finalize_match(
    store: &Store,
    league_id: &str,
    match_id: &str,
    score: Score,
    replay_path: Option<String>,
    goal_timeline: Option<Vec<GoalEvent>>,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, ApiError> {
    let fx_key = fixture_key(league_id, match_id);

    let guard = store.run(|tx| {
        let Some(fx) = tx.get(&store.fixtures, &fx_key)? else {
            return Ok(FinalizeGuard::Missing);
        };
        if fx.status == FixtureStatus::Played {
            return Ok(FinalizeGuard::Already);
        }

        // Slot leagues key standings by slot index, membership leagues by
        // team id; a fixture missing either side settles without standings.
        let use_slots = fx.home_slot.is_some() || fx.away_slot.is_some();
        let keys = if use_slots {
            match (fx.home_slot, fx.away_slot) {
                (Some(h), Some(a)) => Some((h.to_string(), a.to_string())),
                _ => None,
            }
        } else {
            match (&fx.home_team_id, &fx.away_team_id) {
                (Some(h), Some(a)) => Some((h.clone(), a.clone())),
                _ => None,
            }
        };

        let rows = match &keys {
            Some((home_key, away_key)) => {
                let home = tx.get(&store.standings, &standing_key(league_id, home_key))?;
                let away = tx.get(&store.standings, &standing_key(league_id, away_key))?;
                Some((home, away))
            }
            None => None,
        };

        let mut settled = fx.clone();
        settled.finish(score, replay_path.clone(), now);
        settled.goal_timeline = goal_timeline.clone();
        tx.put(&store.fixtures, &fx_key, settled);

        if let (Some((home_key, away_key)), Some((home_row, away_row))) = (keys, rows) {
            let mut home = home_row.unwrap_or_else(|| {
                Standing::zeroed(
                    league_id.to_string(),
                    home_key.clone(),
                    fx.home_slot,
                    fx.home_team_id.clone(),
                    String::new(),
                )
            });
            let mut away = away_row.unwrap_or_else(|| {
                Standing::zeroed(
                    league_id.to_string(),
                    away_key.clone(),
                    fx.away_slot,
                    fx.away_team_id.clone(),
                    String::new(),
                )
            });
            home.record_result(score.home, score.away);
            away.record_result(score.away, score.home);
            tx.put(&store.standings, &standing_key(league_id, &home_key), home);
            tx.put(&store.standings, &standing_key(league_id, &away_key), away);
        }

        Ok(FinalizeGuard::Applied)
    })?;

    match guard {
        FinalizeGuard::Missing => Err(ApiError::NotFound(format!(
            "fixture {} missing in league {}",
            match_id, league_id
        ))),
        FinalizeGuard::Already => Ok(FinalizeOutcome {
            already_played: true,
            league_completed: false,
        }),
        FinalizeGuard::Applied => {
            info!(
                "result finalized: match {} league {} score {}:{}",
                match_id, league_id, score.home, score.away
            );
            // Advisory, non-fatal: if nothing is left open, close the league.
            let league_completed = match rollup_league_state(store, league_id, now) {
                Ok(done) => done,
                Err(e) => {
                    warn!("league {} rollup skipped: {}", league_id, e);
                    false
                }
            };
            Ok(FinalizeOutcome {
                already_played: false,
                league_completed,
            })
        }
    }
}

/// `active -> completed` once no fixture remains scheduled or running.
pub fn rollup_league_state(
    store: &Store,
    league_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    store.run(|tx| {
        let open = tx.scan(&store.fixtures, |_, f| f.league_id == league_id && f.is_open())?;
        if !open.is_empty() {
            return Ok(false);
        }
        let Some(mut league) = tx.get(&store.leagues, league_id)? else {
            return Ok(false);
        };
        if league.state != league_core::LeagueState::Active {
            return Ok(false);
        }
        league
            .complete(now)
            .map_err(|e| StoreError::Aborted(e.to_string()))?;
        tx.put(&store.leagues, league_id, league);
        info!("league {} completed", league_id);
        Ok(true)
    })
}

/// Ingests an uploaded result artifact addressed by the storage path
/// convention. The artifact body carries the score (any accepted shape) and
/// an optional replay reference.
pub fn ingest_result(
    app: &AppData,
    path: &str,
    payload: &Value,
) -> Result<FinalizeOutcome, ApiError> {
    let (season_id, league_id, match_id) = parse_result_path(path)
        .ok_or_else(|| ApiError::InvalidArgument(format!("unrecognized result path '{}'", path)))?;
    let score = normalize_score(payload)
        .ok_or_else(|| ApiError::InvalidArgument("score missing or malformed".into()))?;
    let replay_path = payload
        .get("replay")
        .and_then(|r| r.get("path"))
        .and_then(|p| p.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("replays/{}/{}/{}.json", season_id, league_id, match_id));

    finalize_match(
        &app.store,
        &league_id,
        &match_id,
        score,
        Some(replay_path),
        None,
        Utc::now(),
    )
}

/// Batch/offline settlement: fabricates a placeholder result directly. The
/// score and goal timeline both derive from the fixture seed, so a re-run
/// reproduces the same match.
pub fn settle_match(
    app: &AppData,
    league_id: &str,
    match_id: &str,
) -> Result<FinalizeOutcome, ApiError> {
    let store = &app.store;
    let now = Utc::now();
    let fx_key = fixture_key(league_id, match_id);
    let fixture = store
        .fixtures
        .get(&fx_key)
        .ok_or_else(|| ApiError::NotFound(format!("fixture {} missing", match_id)))?;
    if fixture.status == FixtureStatus::Played {
        return Ok(FinalizeOutcome {
            already_played: true,
            league_completed: false,
        });
    }

    // Walk the same lifecycle as a dispatched match, minus the engine call:
    // running fixture, frozen plan, live league.
    store.run(|tx| {
        let Some(mut fx) = tx.get(&store.fixtures, &fx_key)? else {
            return Ok(());
        };
        if fx.status == FixtureStatus::Scheduled {
            fx.start(now);
            tx.put(&store.fixtures, &fx_key, fx);
        }
        Ok(())
    })?;
    orchestrate::plan::ensure_match_plan(store, &fixture, now)?;
    if let Err(e) = orchestrate::activate_league(store, league_id, now) {
        warn!("league {} activation skipped: {}", league_id, e);
    }

    let seed = fixture
        .seed
        .unwrap_or_else(|| rng::fnv1a64(&format!("{}:{}", league_id, match_id)));
    let score = timeline::placeholder_score(seed);
    let events = timeline::goal_timeline(seed, score);

    finalize_match(store, league_id, match_id, score, None, Some(events), now)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillItem {
    pub match_id: String,
    pub league_id: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub dry_run: bool,
    pub cutoff: DateTime<Utc>,
    pub candidates: usize,
    pub settled: usize,
    pub failed: usize,
    pub items: Vec<BackfillItem>,
}

pub const BACKFILL_DEFAULT_MAX: usize = 200;

/// Cutoff accepted as an RFC3339 instant or a local day key (meaning that
/// day's end of window); absent means "now".
fn parse_cutoff(until: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ApiError> {
    match until {
        None => Ok(now),
        Some(raw) => {
            if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
                return Ok(instant.with_timezone(&Utc));
            }
            if let Ok((_, end)) = league_core::schedule::calendar::day_window(raw) {
                return Ok(end);
            }
            Err(ApiError::InvalidArgument(format!(
                "cannot parse cutoff '{}' as datetime or day key",
                raw
            )))
        }
    }
}

/// Settles every overdue scheduled fixture up to a cutoff, oldest first and
/// bounded. Per-item failures are recorded and do not abort the sweep;
/// dry-run reports what would be processed without mutating anything.
pub fn backfill(
    app: &AppData,
    until: Option<String>,
    max_matches: Option<usize>,
    dry_run: bool,
) -> Result<BackfillReport, ApiError> {
    let store = &app.store;
    let now = Utc::now();
    let cutoff = parse_cutoff(until.as_deref(), now)?;
    let max_matches = max_matches.unwrap_or(BACKFILL_DEFAULT_MAX).max(1);

    let candidates = match store.fixtures.query_ordered(
        |_, f| f.status == FixtureStatus::Scheduled && f.date <= cutoff,
        |f| f.date,
        indexes::FIXTURES_DATE,
    ) {
        Ok(rows) => rows,
        Err(StoreError::MissingIndex { collection, index }) => {
            warn!(
                "index {} missing on {}; backfill using unordered scan",
                index, collection
            );
            store
                .fixtures
                .scan(|_, f| f.status == FixtureStatus::Scheduled && f.date <= cutoff)
        }
        Err(e) => return Err(e.into()),
    };
    let bounded: Vec<_> = candidates.into_iter().take(max_matches).collect();

    let mut report = BackfillReport {
        dry_run,
        cutoff,
        candidates: bounded.len(),
        settled: 0,
        failed: 0,
        items: Vec::with_capacity(bounded.len()),
    };

    for (_, fx) in bounded {
        let mut item = BackfillItem {
            match_id: fx.id.clone(),
            league_id: fx.league_id.clone(),
            date: fx.date,
            error: None,
        };
        if !dry_run {
            match settle_match(app, &fx.league_id, &fx.id) {
                Ok(_) => report.settled += 1,
                Err(e) => {
                    report.failed += 1;
                    item.error = Some(e.to_string());
                    error!("backfill settle failed: match {}: {}", fx.id, e);
                }
            }
        }
        report.items.push(item);
    }

    info!(
        "backfill{}: {} candidates, {} settled, {} failed (cutoff {})",
        if dry_run { " (dry run)" } else { "" },
        report.candidates,
        report.settled,
        report.failed,
        cutoff
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app_with_store, fixture_in_league, membership_fixture};
    use league_core::league::LeagueState;
    use serde_json::json;

    #[test]
    fn test_normalize_score_shapes() {
        assert_eq!(
            normalize_score(&json!({"score": {"home": 2, "away": 1}})),
            Some(Score::new(2, 1))
        );
        assert_eq!(
            normalize_score(&json!({"score": {"h": 0, "a": 3}})),
            Some(Score::new(0, 3))
        );
        assert_eq!(
            normalize_score(&json!({"result": {"homeGoals": 4, "awayGoals": 4}})),
            Some(Score::new(4, 4))
        );
        assert_eq!(normalize_score(&json!({"score": {"home": "x"}})), None);
        assert_eq!(normalize_score(&json!({})), None);
    }

    #[test]
    fn test_parse_result_path() {
        assert_eq!(
            parse_result_path("results/S1/lg1/m1.json"),
            Some(("S1".into(), "lg1".into(), "m1".into()))
        );
        assert_eq!(parse_result_path("replays/S1/lg1/m1.json"), None);
        assert_eq!(parse_result_path("results/S1/lg1/m1.mp4"), None);
        assert_eq!(parse_result_path("results/S1/lg1/deep/m1.json"), None);
    }

    #[test]
    fn test_finalize_updates_both_standings() {
        let app = app_with_store();
        let store = &app.store;
        membership_fixture(store, "lg1", "m1", "teamA", "teamB", LeagueState::Active);

        let outcome = finalize_match(
            store,
            "lg1",
            "m1",
            Score::new(2, 1),
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(!outcome.already_played);

        let home = store.standings.get(&standing_key("lg1", "teamA")).unwrap();
        assert_eq!((home.played, home.won, home.points), (1, 1, 3));
        assert_eq!((home.goals_for, home.goals_against), (2, 1));
        let away = store.standings.get(&standing_key("lg1", "teamB")).unwrap();
        assert_eq!((away.played, away.lost, away.points), (1, 1, 0));
        assert_eq!((away.goals_for, away.goals_against), (1, 2));
    }

    #[test]
    fn test_finalize_twice_applies_once() {
        let app = app_with_store();
        let store = &app.store;
        membership_fixture(store, "lg1", "m1", "teamA", "teamB", LeagueState::Active);

        finalize_match(store, "lg1", "m1", Score::new(2, 1), None, None, Utc::now()).unwrap();
        // Second delivery with a different, stale payload must be a no-op.
        let second =
            finalize_match(store, "lg1", "m1", Score::new(9, 9), None, None, Utc::now()).unwrap();
        assert!(second.already_played);

        let home = store.standings.get(&standing_key("lg1", "teamA")).unwrap();
        assert_eq!(home.played, 1);
        assert_eq!(home.points, 3);
        let fx = store.fixtures.get(&fixture_key("lg1", "m1")).unwrap();
        assert_eq!(fx.score, Some(Score::new(2, 1)));
    }

    #[test]
    fn test_last_finalize_completes_league() {
        let app = app_with_store();
        let store = &app.store;
        membership_fixture(store, "lg1", "m1", "teamA", "teamB", LeagueState::Active);

        let outcome =
            finalize_match(store, "lg1", "m1", Score::new(1, 0), None, None, Utc::now()).unwrap();
        assert!(outcome.league_completed);
        assert_eq!(
            store.leagues.get("lg1").unwrap().state,
            LeagueState::Completed
        );
    }

    #[test]
    fn test_settle_is_deterministic_per_seed() {
        let app_a = app_with_store();
        let app_b = app_with_store();
        for app in [&app_a, &app_b] {
            fixture_in_league(&app.store, "lg1", "m1", LeagueState::Scheduled);
        }

        settle_match(&app_a, "lg1", "m1").unwrap();
        settle_match(&app_b, "lg1", "m1").unwrap();

        let fa = app_a.store.fixtures.get(&fixture_key("lg1", "m1")).unwrap();
        let fb = app_b.store.fixtures.get(&fixture_key("lg1", "m1")).unwrap();
        assert_eq!(fa.score, fb.score);
        assert_eq!(fa.goal_timeline, fb.goal_timeline);
        assert_eq!(fa.status, FixtureStatus::Played);
        if let Some(events) = &fa.goal_timeline {
            if let Some(last) = events.last() {
                let score = fa.score.unwrap();
                assert_eq!((last.home, last.away), (score.home, score.away));
            }
        }
    }

    #[test]
    fn test_ingest_via_path_convention() {
        let app = app_with_store();
        membership_fixture(&app.store, "lg1", "m1", "teamA", "teamB", LeagueState::Active);

        let outcome = ingest_result(
            &app,
            "results/S1/lg1/m1.json",
            &json!({"score": {"h": 3, "a": 2}, "replay": {"path": "replays/custom/m1.json.gz"}}),
        )
        .unwrap();
        assert!(!outcome.already_played);

        let fx = app.store.fixtures.get(&fixture_key("lg1", "m1")).unwrap();
        assert_eq!(fx.score, Some(Score::new(3, 2)));
        assert_eq!(fx.replay_path.as_deref(), Some("replays/custom/m1.json.gz"));
    }

    #[test]
    fn test_backfill_dry_run_mutates_nothing() {
        let app = app_with_store();
        let store = &app.store;
        fixture_in_league(store, "lg1", "m1", LeagueState::Scheduled);

        let report = backfill(&app, Some("2099-01-01".into()), None, true).unwrap();
        assert_eq!(report.candidates, 1);
        assert_eq!(report.settled, 0);
        assert_eq!(
            store.fixtures.get(&fixture_key("lg1", "m1")).unwrap().status,
            FixtureStatus::Scheduled
        );

        let live = backfill(&app, Some("2099-01-01".into()), None, false).unwrap();
        assert_eq!(live.settled, 1);
        assert_eq!(
            store.fixtures.get(&fixture_key("lg1", "m1")).unwrap().status,
            FixtureStatus::Played
        );
    }

    #[test]
    fn test_backfill_bad_cutoff_rejected() {
        let app = app_with_store();
        let err = backfill(&app, Some("soon".into()), None, true).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }
}
