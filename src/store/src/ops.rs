use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-day, per-workflow advisory record guarding daily sweeps against double
/// triggering. Created with create-if-absent semantics, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsLock {
    pub workflow: String,
    pub day: String,
    pub acquired_at: DateTime<Utc>,
}

impl OpsLock {
    pub fn key(workflow: &str, day: &str) -> String {
        format!("{}:{}", workflow, day)
    }
}

/// Daily heartbeat document the watchdog reads; merged after each sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub day: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub orchestrate_ok: bool,
    #[serde(default)]
    pub matches_scheduled: usize,
    #[serde(default)]
    pub matches_settled: usize,
}

/// Poison record for a match the pipeline gave up on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJob {
    pub match_id: String,
    pub league_id: String,
    pub reason: String,
    pub attempt: u32,
    pub ts: DateTime<Utc>,
}
