pub mod routes;

use crate::AppData;
use crate::config::ServerConfig;
use chrono::{DateTime, Duration, Utc};
use league_core::league::FixtureStatus;
use league_core::schedule::calendar;
use log::{debug, error, info, warn};
use serde::Serialize;
use store::{FailedJob, Heartbeat, Store, fixture_key};

/// Grace after the daily kickoff before a missing heartbeat counts as a
/// problem; mirrors the 19:10 check slot.
const HEARTBEAT_GRACE_MINUTES: i64 = 10;

/// How many offenders of each kind the sweep reports before cutting off.
const WATCHDOG_SCAN_LIMIT: usize = 50;

/// Merge-style heartbeat update for the day's ops document.
pub fn mark_heartbeat(store: &Store, day: &str, patch: impl Fn(&mut Heartbeat)) {
    let result = store.run(|tx| {
        let mut hb = tx.get(&store.heartbeats, day)?.unwrap_or_else(|| Heartbeat {
            day: day.to_string(),
            ..Heartbeat::default()
        });
        patch(&mut hb);
        tx.put(&store.heartbeats, day, hb);
        Ok(())
    });
    if let Err(e) = result {
        warn!("heartbeat write failed for {}: {}", day, e);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogReport {
    pub ok: bool,
    pub day: String,
    pub problems: Vec<String>,
    pub scheduled_past: usize,
    pub long_running: usize,
}

/// Read-only sweep over the pipeline: fixtures that should have started but
/// did not, fixtures running past the threshold, and a missing daily
/// heartbeat. Anything found is raised as an operational alert; the watchdog
/// never repairs state itself.
pub fn run_watchdog(store: &Store, config: &ServerConfig, now: DateTime<Utc>) -> WatchdogReport {
    let day = calendar::day_key(now);
    let mut problems = Vec::new();

    let heartbeat_due =
        calendar::kickoff_on(calendar::local_day(now)) + Duration::minutes(HEARTBEAT_GRACE_MINUTES);
    if now >= heartbeat_due {
        let hb = store.heartbeats.get(&day);
        if !hb.map(|h| h.orchestrate_ok).unwrap_or(false) {
            problems.push(format!("heartbeat missing for {}", day));
        }
    }

    let mut scheduled_past = store
        .fixtures
        .scan(|_, f| f.status == FixtureStatus::Scheduled && f.date < now);
    scheduled_past.truncate(WATCHDOG_SCAN_LIMIT);
    if !scheduled_past.is_empty() {
        problems.push(format!("scheduledPast={}", scheduled_past.len()));
    }

    let stuck_cutoff = now - Duration::seconds(config.watchdog_running_secs);
    let mut long_running = store.fixtures.scan(|_, f| {
        f.status == FixtureStatus::Running
            && f.started_at.map(|t| t <= stuck_cutoff).unwrap_or(false)
    });
    long_running.truncate(WATCHDOG_SCAN_LIMIT);
    if !long_running.is_empty() {
        problems.push(format!("longRunning={}", long_running.len()));
    }

    let report = WatchdogReport {
        ok: problems.is_empty(),
        day: day.clone(),
        scheduled_past: scheduled_past.len(),
        long_running: long_running.len(),
        problems,
    };

    if report.ok {
        debug!("watchdog ok for {}", day);
    } else {
        error!("🚨 watchdog {}: {}", day, report.problems.join(" • "));
    }
    report
}

/// Poison record for a match the pipeline gave up on: fixture flipped to
/// `failed`, a failed-job doc written, and an alert logged.
pub fn mark_poison(store: &Store, match_id: &str, league_id: &str, reason: &str, attempt: u32) {
    let now = Utc::now();
    let fx_key = fixture_key(league_id, match_id);
    if let Some(mut fx) = store.fixtures.get(&fx_key) {
        fx.fail(reason.to_string(), now);
        store.fixtures.put(&fx_key, fx);
    }
    store.failed_jobs.put(
        match_id,
        FailedJob {
            match_id: match_id.to_string(),
            league_id: league_id.to_string(),
            reason: reason.to_string(),
            attempt,
            ts: now,
        },
    );
    error!(
        "match poisoned: {} (league {}) attempt={} reason={}",
        match_id, league_id, attempt, reason
    );
}

/// Schedules a delayed per-match finalize check. A match still unfinished
/// when the check fires is force-redispatched a bounded number of times,
/// then poisoned.
pub fn spawn_finalize_watchdog(app: &AppData, match_id: &str, league_id: &str, attempt: u32) {
    let app = app.clone();
    let match_id = match_id.to_string();
    let league_id = league_id.to_string();
    let delay = app.config.finalize_watchdog_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        finalize_watchdog_tick(app, match_id, league_id, attempt).await;
    });
}

async fn finalize_watchdog_tick(app: AppData, match_id: String, league_id: String, attempt: u32) {
    let fx_key = fixture_key(&league_id, &match_id);
    let Some(fx) = app.store.fixtures.get(&fx_key) else {
        mark_poison(&app.store, &match_id, &league_id, "fixture_missing", attempt);
        return;
    };
    if fx.status == FixtureStatus::Played {
        debug!("finalize watchdog: match {} played", match_id);
        return;
    }

    if attempt + 1 < app.config.finalize_max_retries {
        let redispatch =
            crate::orchestrate::start_match_internal(&app, &match_id, &league_id, true).await;
        if let Err(e) = redispatch {
            warn!("finalize watchdog redispatch failed for {}: {}", match_id, e);
        }
        info!(
            "finalize watchdog retry scheduled: match {} attempt {}",
            match_id,
            attempt + 1
        );
        spawn_finalize_watchdog(&app, &match_id, &league_id, attempt + 1);
    } else {
        mark_poison(
            &app.store,
            &match_id,
            &league_id,
            &fx.status.to_string(),
            attempt,
        );
    }
}
