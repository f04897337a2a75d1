use crate::{AppData, monitor, orchestrate};
use chrono::Utc;
use league_core::schedule::calendar;
use log::{error, info};
use std::time::Duration;
use store::{OpsLock, StoreError};

/// How often the loops wake up to check the clock.
const TICK: Duration = Duration::from_secs(60);
const WATCHDOG_EVERY_TICKS: u32 = 10;

/// In-process replacement for the external cron pair: the daily dispatch
/// trigger at the kickoff hour and a periodic watchdog sweep. The per-day
/// ops lock makes the dispatch fire exactly once even with several server
/// instances ticking against the same store.
pub fn spawn(app: AppData) {
    let dispatch_app = app.clone();
    tokio::spawn(async move {
        info!("daily dispatch loop up (kickoff {}:00 local)", calendar::KICKOFF_HOUR);
        loop {
            tokio::time::sleep(TICK).await;
            let now = Utc::now();
            if now < calendar::kickoff_on(calendar::local_day(now)) {
                continue;
            }
            let day = calendar::day_key(now);
            match acquire_daily_lock(&dispatch_app, "play-day", &day, now) {
                Ok(true) => {
                    info!("daily dispatch trigger fired for {}", day);
                    if let Err(e) = orchestrate::play_day(&dispatch_app, Some(day.clone()), false).await
                    {
                        error!("daily dispatch failed for {}: {}", day, e);
                    }
                }
                Ok(false) => {
                    // Another trigger already swept this day; a normal skip.
                }
                Err(e) => error!("daily lock check failed for {}: {}", day, e),
            }
        }
    });

    let watchdog_app = app;
    tokio::spawn(async move {
        let mut ticks = 0u32;
        loop {
            tokio::time::sleep(TICK).await;
            ticks += 1;
            if ticks % WATCHDOG_EVERY_TICKS != 0 {
                continue;
            }
            // Read-only; the report logs its own alert when problems exist.
            let _ = monitor::run_watchdog(&watchdog_app.store, &watchdog_app.config, Utc::now());
        }
    });
}

/// Create-if-absent on the per-day lock document. Losing the race is the
/// expected outcome for every instance but one, reported as `false`.
fn acquire_daily_lock(
    app: &AppData,
    workflow: &str,
    day: &str,
    now: chrono::DateTime<Utc>,
) -> Result<bool, StoreError> {
    let key = OpsLock::key(workflow, day);
    match app.store.ops_locks.create(
        &key,
        OpsLock {
            workflow: workflow.to_string(),
            day: day.to_string(),
            acquired_at: now,
        },
    ) {
        Ok(()) => Ok(true),
        Err(StoreError::AlreadyExists { .. }) => {
            info!("daily sweep {} already triggered for {}", workflow, day);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::app_with_store;

    #[test]
    fn test_daily_lock_is_create_if_absent() {
        let app = app_with_store();
        let now = Utc::now();
        assert!(acquire_daily_lock(&app, "play-day", "2025-03-02", now).unwrap());
        assert!(!acquire_daily_lock(&app, "play-day", "2025-03-02", now).unwrap());
        // A different workflow or day is an independent lock.
        assert!(acquire_daily_lock(&app, "watchdog", "2025-03-02", now).unwrap());
        assert!(acquire_daily_lock(&app, "play-day", "2025-03-03", now).unwrap());
    }
}
