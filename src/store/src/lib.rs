pub mod batch;
pub mod bootstrap;
pub mod collection;
pub mod error;
pub mod ops;
pub mod tx;

pub use batch::{BulkWriter, MAX_BATCH};
pub use bootstrap::{BootstrapConfig, BootstrapReport, Bootstrapper};
pub use collection::Collection;
pub use error::StoreError;
pub use ops::{FailedJob, Heartbeat, OpsLock};
pub use tx::Tx;

use league_core::league::{Fixture, League, Membership, Slot, Standing};
use league_core::r#match::MatchPlan;
use league_core::{Bot, Team};
use std::sync::{Arc, Mutex};

/// Index names callers pass to ordered queries.
pub mod indexes {
    /// Forming leagues ordered by creation time.
    pub const LEAGUES_STATE_CREATED_AT: &str = "state_created_at";
    /// Fixtures ordered by scheduled date.
    pub const FIXTURES_DATE: &str = "date";
    /// Slots ordered by slot index within a league.
    pub const SLOTS_INDEX: &str = "slot_index";
}

/// The transactional document store every component coordinates through.
/// All collections share one commit gate, so optimistic transactions,
/// create-if-absent writes and bulk chunks serialize at the commit point
/// while reads stay lock-cheap.
pub struct Store {
    pub leagues: Collection<League>,
    pub slots: Collection<Slot>,
    pub standings: Collection<Standing>,
    pub fixtures: Collection<Fixture>,
    pub memberships: Collection<Membership>,
    pub teams: Collection<Team>,
    pub bots: Collection<Bot>,
    pub match_plans: Collection<MatchPlan>,
    pub ops_locks: Collection<OpsLock>,
    pub heartbeats: Collection<Heartbeat>,
    pub failed_jobs: Collection<FailedJob>,
    gate: Arc<Mutex<()>>,
}

impl Store {
    pub fn new() -> Self {
        let store = Store::new_without_indexes();
        store.leagues.declare_index(indexes::LEAGUES_STATE_CREATED_AT);
        store.fixtures.declare_index(indexes::FIXTURES_DATE);
        store.slots.declare_index(indexes::SLOTS_INDEX);
        store
    }

    /// A store with no declared indexes; exercises the unordered fallback
    /// paths in tests.
    pub fn new_without_indexes() -> Self {
        let gate = Arc::new(Mutex::new(()));
        Store {
            leagues: Collection::new("leagues", Arc::clone(&gate)),
            slots: Collection::new("slots", Arc::clone(&gate)),
            standings: Collection::new("standings", Arc::clone(&gate)),
            fixtures: Collection::new("fixtures", Arc::clone(&gate)),
            memberships: Collection::new("memberships", Arc::clone(&gate)),
            teams: Collection::new("teams", Arc::clone(&gate)),
            bots: Collection::new("bots", Arc::clone(&gate)),
            match_plans: Collection::new("match_plans", Arc::clone(&gate)),
            ops_locks: Collection::new("ops_locks", Arc::clone(&gate)),
            heartbeats: Collection::new("heartbeats", Arc::clone(&gate)),
            failed_jobs: Collection::new("failed_jobs", Arc::clone(&gate)),
            gate,
        }
    }

    pub(crate) fn commit_gate(&self) -> &Mutex<()> {
        &self.gate
    }

    /// Runs `action` as one optimistic transaction. On a version conflict or
    /// an explicit `RetryRequested` the closure is re-invoked, up to a bounded
    /// number of attempts; any other error aborts immediately.
    pub fn run<'s, R>(
        &'s self,
        mut action: impl FnMut(&mut Tx<'s>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        for attempt in 0..tx::MAX_TX_ATTEMPTS {
            let mut tx = Tx::new();
            match action(&mut tx) {
                Ok(result) => {
                    let gate = self.gate.lock().expect("commit gate poisoned");
                    match tx.validate() {
                        Ok(()) => {
                            tx.commit();
                            drop(gate);
                            return Ok(result);
                        }
                        Err(conflict) => {
                            drop(gate);
                            tx::log_retry(attempt, &conflict);
                        }
                    }
                }
                Err(err) if err.is_retryable() => tx::log_retry(attempt, &err),
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::RetriesExhausted(tx::MAX_TX_ATTEMPTS))
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

// ========== DOCUMENT KEY CONVENTIONS ==========

pub fn fixture_key(league_id: &str, match_id: &str) -> String {
    format!("{}:{}", league_id, match_id)
}

pub fn slot_key(league_id: &str, slot_index: u32) -> String {
    format!("{}:{}", league_id, slot_index)
}

pub fn standing_key(league_id: &str, key: &str) -> String {
    format!("{}:{}", league_id, key)
}

pub fn membership_key(league_id: &str, team_id: &str) -> String {
    format!("{}:{}", league_id, team_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use league_core::league::{League, LeagueState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn league(id: &str, season: u32) -> League {
        League::new(
            id.into(),
            format!("Lig {}", season),
            season,
            4,
            "Europe/Istanbul".into(),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = Store::new();
        store.leagues.put("lg1", league("lg1", 1));
        let loaded = store.leagues.get("lg1").unwrap();
        assert_eq!(loaded.season, 1);
        assert_eq!(loaded.state, LeagueState::Forming);
        assert!(store.leagues.get("missing").is_none());
    }

    #[test]
    fn test_create_if_absent() {
        let store = Store::new();
        store.leagues.create("lg1", league("lg1", 1)).unwrap();
        let err = store.leagues.create("lg1", league("lg1", 2)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.leagues.get("lg1").unwrap().season, 1);
    }

    #[test]
    fn test_transaction_read_then_write() {
        let store = Store::new();
        store.leagues.put("lg1", league("lg1", 1));
        store
            .run(|tx| {
                let mut lg = tx.get(&store.leagues, "lg1")?.expect("league exists");
                lg.team_count += 1;
                tx.put(&store.leagues, "lg1", lg);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.leagues.get("lg1").unwrap().team_count, 1);
    }

    #[test]
    fn test_reads_must_precede_writes() {
        let store = Store::new();
        store.leagues.put("lg1", league("lg1", 1));
        let err = store
            .run(|tx| {
                tx.put(&store.leagues, "lg1", league("lg1", 2));
                tx.get(&store.leagues, "lg1")?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ReadAfterWrite(_)));
    }

    #[test]
    fn test_concurrent_counter_increments_all_land() {
        let store = Arc::new(Store::new());
        store.leagues.put("lg1", league("lg1", 1));

        let threads = 8;
        let per_thread = 25;
        std::thread::scope(|scope| {
            for _ in 0..threads {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..per_thread {
                        store
                            .run(|tx| {
                                let mut lg =
                                    tx.get(&store.leagues, "lg1")?.expect("league exists");
                                lg.team_count += 1;
                                tx.put(&store.leagues, "lg1", lg);
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(
            store.leagues.get("lg1").unwrap().team_count,
            threads * per_thread
        );
    }

    #[test]
    fn test_retry_requested_reinvokes_closure() {
        let store = Store::new();
        let calls = AtomicUsize::new(0);
        let result = store.run(|_tx| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::RetryRequested("capacity race".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_query_validation_catches_phantom_insert() {
        // A transaction that scanned a collection must conflict when another
        // writer inserts into it before commit.
        let store = Arc::new(Store::new());
        let seen = AtomicUsize::new(0);
        let result = store.run(|tx| {
            let forming = tx.scan(&store.leagues, |_, l| l.state == LeagueState::Forming)?;
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                // Simulate a concurrent writer racing the commit.
                store.leagues.put("lg-race", league("lg-race", 9));
            }
            tx.put(
                &store.leagues,
                "lg-new",
                league("lg-new", forming.len() as u32 + 1),
            );
            Ok(())
        });
        result.unwrap();
        // First attempt conflicted, second attempt saw the racing league.
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(store.leagues.get("lg-new").unwrap().season, 2);
    }

    #[test]
    fn test_missing_index_is_reported() {
        let store = Store::new_without_indexes();
        store.leagues.put("lg1", league("lg1", 1));
        let err = store
            .leagues
            .query_ordered(
                |_, l| l.state == LeagueState::Forming,
                |l| l.created_at,
                indexes::LEAGUES_STATE_CREATED_AT,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingIndex { .. }));
    }

    #[test]
    fn test_ordered_query_with_declared_index() {
        let store = Store::new();
        let mut early = league("lg-b", 2);
        early.created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        store.leagues.put("lg-b", early);
        store.leagues.put("lg-a", league("lg-a", 1));

        let rows = store
            .leagues
            .query_ordered(
                |_, l| l.state == LeagueState::Forming,
                |l| l.created_at,
                indexes::LEAGUES_STATE_CREATED_AT,
            )
            .unwrap();
        assert_eq!(rows[0].0, "lg-b");
    }

    #[test]
    fn test_bulk_writer_chunks_and_counts() {
        let store = Store::new();
        let mut bulk = BulkWriter::new(&store);
        for i in 0..1000 {
            bulk.put(&store.leagues, &format!("lg{}", i), league("x", i));
        }
        assert_eq!(bulk.finish(), 1000);
        assert_eq!(store.leagues.len(), 1000);
    }
}
