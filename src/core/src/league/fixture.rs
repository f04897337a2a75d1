use crate::r#match::timeline::GoalEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureStatus {
    Scheduled,
    Running,
    Played,
    Failed,
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixtureStatus::Scheduled => "scheduled",
            FixtureStatus::Running => "running",
            FixtureStatus::Played => "played",
            FixtureStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn new(home: u32, away: u32) -> Self {
        Score { home, away }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: String,
    pub league_id: String,
    pub round: u32,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub home_slot: Option<u32>,
    #[serde(default)]
    pub away_slot: Option<u32>,
    #[serde(default)]
    pub home_team_id: Option<String>,
    #[serde(default)]
    pub away_team_id: Option<String>,
    pub participants: Vec<String>,
    pub status: FixtureStatus,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replay_path: Option<String>,
    #[serde(default)]
    pub goal_timeline: Option<Vec<GoalEvent>>,
    #[serde(default)]
    pub fail_reason: Option<String>,
}

impl Fixture {
    pub fn new(id: String, league_id: String, round: u32, date: DateTime<Utc>, seed: u64) -> Self {
        Fixture {
            id,
            league_id,
            round,
            date,
            home_slot: None,
            away_slot: None,
            home_team_id: None,
            away_team_id: None,
            participants: Vec::new(),
            status: FixtureStatus::Scheduled,
            score: None,
            seed: Some(seed),
            started_at: None,
            ended_at: None,
            replay_path: None,
            goal_timeline: None,
            fail_reason: None,
        }
    }

    pub fn with_teams(mut self, home_team_id: Option<String>, away_team_id: Option<String>) -> Self {
        self.home_team_id = home_team_id;
        self.away_team_id = away_team_id;
        self.refresh_participants();
        self
    }

    pub fn with_slots(mut self, home_slot: u32, away_slot: u32) -> Self {
        self.home_slot = Some(home_slot);
        self.away_slot = Some(away_slot);
        self
    }

    /// Keeps the denormalized participant list in sync with the side refs.
    pub fn refresh_participants(&mut self) {
        self.participants = [&self.home_team_id, &self.away_team_id]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
    }

    /// Still waiting for or executing its match.
    pub fn is_open(&self) -> bool {
        matches!(self.status, FixtureStatus::Scheduled | FixtureStatus::Running)
    }

    pub fn start(&mut self, at: DateTime<Utc>) {
        self.status = FixtureStatus::Running;
        self.started_at = Some(at);
    }

    pub fn finish(&mut self, score: Score, replay_path: Option<String>, at: DateTime<Utc>) {
        self.status = FixtureStatus::Played;
        self.score = Some(score);
        self.replay_path = replay_path;
        self.ended_at = Some(at);
    }

    pub fn fail(&mut self, reason: String, at: DateTime<Utc>) {
        self.status = FixtureStatus::Failed;
        self.fail_reason = Some(reason);
        self.ended_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_participants_follow_team_refs() {
        let date = Utc.with_ymd_and_hms(2025, 3, 2, 16, 0, 0).unwrap();
        let mut fx = Fixture::new("m1".into(), "lg1".into(), 1, date, 7)
            .with_teams(Some("a".into()), None);
        assert_eq!(fx.participants, vec!["a".to_string()]);
        fx.away_team_id = Some("b".into());
        fx.refresh_participants();
        assert_eq!(fx.participants.len(), 2);
    }

    #[test]
    fn test_status_flow() {
        let date = Utc.with_ymd_and_hms(2025, 3, 2, 16, 0, 0).unwrap();
        let mut fx = Fixture::new("m1".into(), "lg1".into(), 1, date, 7);
        assert!(fx.is_open());
        fx.start(date);
        assert!(fx.is_open());
        fx.finish(Score::new(2, 1), None, date);
        assert!(!fx.is_open());
        assert_eq!(fx.score, Some(Score::new(2, 1)));
    }
}
