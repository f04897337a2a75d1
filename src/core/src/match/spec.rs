use super::plan::{MatchPlan, PlanSide};
use crate::team::Team;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// One player line in the wire schema. Enrichment fields are best-effort:
/// a pid with no roster match still ships, just without pos/ovr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub pid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ovr: Option<f32>,
    pub stamina: f32,
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSide {
    pub team_id: String,
    pub name: String,
    pub formation: String,
    pub tactics: serde_json::Value,
    pub players: Vec<PlayerEntry>,
    pub bench: Vec<PlayerEntry>,
}

/// Versioned match specification sent to the external simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSpec {
    pub schema_version: u32,
    pub match_id: String,
    pub league_id: String,
    pub season_id: String,
    pub kickoff_utc: String,
    pub rng_seed: u64,
    pub home: SpecSide,
    pub away: SpecSide,
}

fn map_players(ids: &[String], roster: Option<&Team>) -> Vec<PlayerEntry> {
    ids.iter()
        .map(|pid| {
            let found = roster.and_then(|t| t.player_by_id(pid));
            PlayerEntry {
                pid: pid.clone(),
                pos: found.map(|p| p.position.clone()),
                ovr: found.map(|p| p.overall),
                stamina: 1.0,
                traits: Vec::new(),
            }
        })
        .collect()
}

fn build_side(side: &PlanSide, roster: Option<&Team>) -> SpecSide {
    SpecSide {
        team_id: side.team_id.clone(),
        name: side.name.clone(),
        formation: side.formation.clone(),
        tactics: side.tactics.clone(),
        players: map_players(&side.starters, roster),
        bench: map_players(&side.subs, roster),
    }
}

impl MatchSpec {
    pub const SCHEMA_VERSION: u32 = 1;

    /// Serializes the frozen plan into the engine schema, enriching player
    /// entries from the rosters when available.
    pub fn build(plan: &MatchPlan, home_roster: Option<&Team>, away_roster: Option<&Team>) -> Self {
        MatchSpec {
            schema_version: Self::SCHEMA_VERSION,
            match_id: plan.match_id.clone(),
            league_id: plan.league_id.clone(),
            season_id: plan.season_id.clone(),
            kickoff_utc: plan.kickoff_utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            rng_seed: plan.rng_seed,
            home: build_side(&plan.home, home_roster),
            away: build_side(&plan.away, away_roster),
        }
    }
}
