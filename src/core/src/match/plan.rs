use crate::team::Team;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a frozen match plan: everything the engine needs to field the
/// team, captured at dispatch time so later roster edits cannot reach a match
/// already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSide {
    pub team_id: String,
    pub name: String,
    pub formation: String,
    pub tactics: serde_json::Value,
    pub starters: Vec<String>,
    pub subs: Vec<String>,
}

impl PlanSide {
    /// Snapshot from the current team record; a missing team degrades to an
    /// empty lineup rather than failing the dispatch.
    pub fn from_team(team_id: &str, team: Option<&Team>) -> Self {
        match team {
            Some(t) => {
                let lineup = t.lineup.as_ref();
                PlanSide {
                    team_id: t.id.clone(),
                    name: t.name.clone(),
                    formation: lineup
                        .map(|l| l.formation.clone())
                        .unwrap_or_else(|| "auto".to_string()),
                    tactics: lineup
                        .map(|l| l.tactics.clone())
                        .unwrap_or_else(|| serde_json::json!({})),
                    starters: lineup.map(|l| l.starters.clone()).unwrap_or_default(),
                    subs: lineup.map(|l| l.subs.clone()).unwrap_or_default(),
                }
            }
            None => PlanSide {
                team_id: team_id.to_string(),
                name: team_id.to_string(),
                formation: "auto".to_string(),
                tactics: serde_json::json!({}),
                starters: Vec::new(),
                subs: Vec::new(),
            },
        }
    }
}

/// Immutable lineup snapshot for one match; written once, never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlan {
    pub match_id: String,
    pub league_id: String,
    pub season_id: String,
    pub rng_seed: u64,
    pub kickoff_utc: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub home: PlanSide,
    pub away: PlanSide,
}
