pub mod engine;
pub mod plan;
pub mod queue;
pub mod routes;

pub use engine::{EngineClient, EngineOutcome};
pub use queue::{EnqueueOutcome, StartQueue};

use crate::config::OrchMode;
use crate::error::ApiError;
use crate::{AppData, monitor, results};
use chrono::Utc;
use league_core::league::{Fixture, FixtureStatus};
use league_core::schedule::calendar;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use store::{Store, StoreError, fixture_key, indexes};

/// Cap on how many overdue fixtures one trigger will pick up, so a backlog
/// cannot turn the daily sweep into an unbounded scan.
const OVERDUE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    pub skipped: bool,
    pub dispatched: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayDayReport {
    pub day: String,
    pub total: usize,
    pub enqueued: usize,
    pub started: usize,
    pub settled: usize,
    pub failed: usize,
}

enum StartGuard {
    Missing,
    Started(Fixture),
    Skip(Fixture),
}

/// The start handler behind every work item. One transaction flips
/// `scheduled -> running` exactly once; a redelivered task finds the fixture
/// already advanced and no-ops. That guard is what makes the whole at-least-
/// once channel safe.
pub async fn start_match_internal(
    app: &AppData,
    match_id: &str,
    league_id: &str,
    force_redispatch: bool,
) -> Result<StartReport, ApiError> {
    let store = &app.store;
    let now = Utc::now();
    let fx_key = fixture_key(league_id, match_id);

    let guard = store.run(|tx| {
        let Some(mut fx) = tx.get(&store.fixtures, &fx_key)? else {
            return Ok(StartGuard::Missing);
        };
        match fx.status {
            FixtureStatus::Scheduled => {
                fx.start(now);
                tx.put(&store.fixtures, &fx_key, fx.clone());
                Ok(StartGuard::Started(fx))
            }
            _ => Ok(StartGuard::Skip(fx)),
        }
    })?;

    let fixture = match guard {
        StartGuard::Missing => {
            return Err(ApiError::NotFound(format!("fixture {} missing", match_id)));
        }
        StartGuard::Started(fx) => fx,
        StartGuard::Skip(fx) => {
            if !force_redispatch {
                // Redelivery or a duplicate trigger; already advanced.
                warn!(
                    "start skipped: match {} already {} (league {})",
                    match_id, fx.status, league_id
                );
                return Ok(StartReport {
                    skipped: true,
                    dispatched: false,
                });
            }
            if fx.status == FixtureStatus::Played {
                return Ok(StartReport {
                    skipped: true,
                    dispatched: false,
                });
            }
            // Forced redispatch continues with the fixture as-is; make sure
            // it is marked running so the watchdog keeps tracking it.
            if fx.status != FixtureStatus::Running {
                let mut running = fx.clone();
                running.start(now);
                store.fixtures.put(&fx_key, running.clone());
                running
            } else {
                fx
            }
        }
    };

    // Freeze the lineups before anything can edit them mid-flight.
    let match_plan = plan::ensure_match_plan(store, &fixture, now)?;

    // First dispatch of the league flips it live. Advisory, non-fatal.
    if let Err(e) = activate_league(store, league_id, now) {
        debug!("league {} activation skipped: {}", league_id, e);
    }

    // The match is in flight from here on: an engine failure is logged for
    // manual or watchdog-driven recovery, never rolled back.
    let spec = plan::build_spec(store, &match_plan);
    let dispatched = match app.engine.dispatch(&spec).await {
        Ok(EngineOutcome::Dispatched) => {
            info!("match dispatched: {} (league {})", match_id, league_id);
            true
        }
        Ok(EngineOutcome::BatchMode) => false,
        Err(e) => {
            error!(
                "engine dispatch failed: match {} league {} class {}: {}",
                match_id,
                league_id,
                e.class(),
                e
            );
            false
        }
    };

    monitor::spawn_finalize_watchdog(app, match_id, league_id, 0);

    Ok(StartReport {
        skipped: false,
        dispatched,
    })
}

pub(crate) fn activate_league(
    store: &Store,
    league_id: &str,
    now: chrono::DateTime<Utc>,
) -> Result<(), StoreError> {
    store.run(|tx| {
        let Some(mut league) = tx.get(&store.leagues, league_id)? else {
            return Ok(());
        };
        if league.state == league_core::LeagueState::Scheduled {
            league
                .activate(now)
                .map_err(|e| StoreError::Aborted(e.to_string()))?;
            tx.put(&store.leagues, league_id, league);
        }
        Ok(())
    })
}

/// The daily dispatch trigger: collects the day's 19:00-23:59 window plus a
/// bounded overdue catch-up, then fans out per the configured mode. With
/// `instant_settle` the whole day is settled inline from the placeholder
/// engine instead of being dispatched.
pub async fn play_day(
    app: &AppData,
    day_key: Option<String>,
    instant_settle: bool,
) -> Result<PlayDayReport, ApiError> {
    let store = &app.store;
    let now = Utc::now();
    let day = day_key.unwrap_or_else(|| calendar::day_key(now));
    let (window_start, window_end) =
        calendar::day_window(&day).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;

    let todays = store.fixtures.scan(|_, f| {
        f.status == FixtureStatus::Scheduled && f.date >= window_start && f.date <= window_end
    });

    // Catch up anything scheduled before the window that never started.
    let overdue = match store.fixtures.query_ordered(
        |_, f| f.status == FixtureStatus::Scheduled && f.date < window_start,
        |f| f.date,
        indexes::FIXTURES_DATE,
    ) {
        Ok(rows) => rows.into_iter().take(OVERDUE_LIMIT).collect::<Vec<_>>(),
        Err(StoreError::MissingIndex { collection, index }) => {
            warn!(
                "index {} missing on {}; overdue catch-up using unordered scan",
                index, collection
            );
            let mut rows = store
                .fixtures
                .scan(|_, f| f.status == FixtureStatus::Scheduled && f.date < window_start);
            rows.truncate(OVERDUE_LIMIT);
            rows
        }
        Err(e) => return Err(e.into()),
    };

    let mut seen = HashSet::new();
    let docs: Vec<(String, Fixture)> = todays
        .into_iter()
        .chain(overdue)
        .filter(|(key, _)| seen.insert(key.clone()))
        .collect();

    info!(
        "play-day {}: {} fixtures to process (mode {:?}, instant_settle {})",
        day,
        docs.len(),
        app.config.orch_mode,
        instant_settle
    );

    let mut report = PlayDayReport {
        day: day.clone(),
        total: docs.len(),
        enqueued: 0,
        started: 0,
        settled: 0,
        failed: 0,
    };

    if instant_settle {
        for (_, fx) in &docs {
            match results::settle_match(app, &fx.league_id, &fx.id) {
                Ok(_) => report.settled += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("instant settle failed: match {}: {}", fx.id, e);
                }
            }
        }
    } else {
        match app.config.orch_mode {
            OrchMode::Tasks => {
                for (_, fx) in &docs {
                    // AlreadyExists still counts: the logical task exists.
                    app.queue.enqueue(&fx.id, &fx.league_id);
                    report.enqueued += 1;
                }
            }
            OrchMode::Serial => {
                for (_, fx) in &docs {
                    match start_match_internal(app, &fx.id, &fx.league_id, false).await {
                        Ok(_) => report.started += 1,
                        Err(e) => {
                            report.failed += 1;
                            error!("start failed: match {}: {}", fx.id, e);
                        }
                    }
                }
            }
        }
    }

    monitor::mark_heartbeat(store, &day, |hb| {
        hb.last_updated = Some(now);
        hb.orchestrate_ok = true;
        hb.matches_scheduled = report.total;
        hb.matches_settled = report.settled;
    });

    info!(
        "play-day {} done: {} enqueued, {} started, {} settled, {} failed",
        day, report.enqueued, report.started, report.settled, report.failed
    );

    Ok(report)
}
