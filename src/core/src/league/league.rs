use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeagueState {
    Forming,
    Scheduled,
    Active,
    Completed,
}

impl LeagueState {
    /// The lifecycle only ever moves forward; nothing is reversible short of
    /// an administrative season reset.
    pub fn can_transition_to(self, next: LeagueState) -> bool {
        matches!(
            (self, next),
            (LeagueState::Forming, LeagueState::Scheduled)
                | (LeagueState::Scheduled, LeagueState::Active)
                | (LeagueState::Active, LeagueState::Completed)
        )
    }
}

impl fmt::Display for LeagueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeagueState::Forming => "forming",
            LeagueState::Scheduled => "scheduled",
            LeagueState::Active => "active",
            LeagueState::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid league transition {from} -> {to}")]
    InvalidTransition { from: LeagueState, to: LeagueState },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: String,
    pub name: String,
    pub season: u32,
    pub capacity: usize,
    pub timezone: String,
    pub state: LeagueState,
    pub rounds: u32,
    pub team_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub month_key: Option<String>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl League {
    pub fn new(
        id: String,
        name: String,
        season: u32,
        capacity: usize,
        timezone: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        League {
            id,
            name,
            season,
            capacity,
            timezone,
            state: LeagueState::Forming,
            rounds: capacity.saturating_sub(1) as u32,
            team_count: 0,
            created_at,
            start_date: None,
            month_key: None,
            activated_at: None,
            completed_at: None,
        }
    }

    pub fn season_id(&self) -> String {
        format!("S{}", self.season)
    }

    pub fn is_full(&self) -> bool {
        self.team_count >= self.capacity
    }

    fn transition(&mut self, next: LeagueState) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// `forming -> scheduled`, stamping the computed kickoff instant.
    pub fn schedule_at(&mut self, start: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(LeagueState::Scheduled)?;
        self.start_date = Some(start);
        Ok(())
    }

    /// `scheduled -> active`, on the first successful match dispatch.
    pub fn activate(&mut self, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(LeagueState::Active)?;
        self.activated_at = Some(at);
        Ok(())
    }

    /// `active -> completed`, once no fixture is left open.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(LeagueState::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Administrative season reset: bypasses the forward-only guard because a
    /// wipe-and-rebuild is the one sanctioned way back.
    pub fn reset_season(&mut self, start: DateTime<Utc>, month_key: String, rounds: u32) {
        log::info!(
            "league {} season reset: {} -> scheduled, start {}",
            self.id,
            self.state,
            start
        );
        self.state = LeagueState::Scheduled;
        self.start_date = Some(start);
        self.month_key = Some(month_key);
        self.rounds = rounds;
        self.activated_at = None;
        self.completed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn league() -> League {
        League::new(
            "lg1".into(),
            "Lig 1".into(),
            1,
            4,
            "Europe/Istanbul".into(),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut lg = league();
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 16, 0, 0).unwrap();
        lg.schedule_at(at).unwrap();
        assert_eq!(lg.state, LeagueState::Scheduled);
        assert_eq!(lg.start_date, Some(at));
        lg.activate(at).unwrap();
        lg.complete(at).unwrap();
        assert_eq!(lg.state, LeagueState::Completed);
    }

    #[test]
    fn test_transitions_are_forward_only() {
        let mut lg = league();
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 16, 0, 0).unwrap();
        assert!(lg.activate(at).is_err());
        assert!(lg.complete(at).is_err());
        lg.schedule_at(at).unwrap();
        assert!(lg.schedule_at(at).is_err());
        lg.activate(at).unwrap();
        assert!(lg.schedule_at(at).is_err());
    }

    #[test]
    fn test_reset_season_rewinds_state() {
        let mut lg = league();
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 16, 0, 0).unwrap();
        lg.schedule_at(at).unwrap();
        lg.activate(at).unwrap();
        lg.complete(at).unwrap();
        lg.reset_season(at, "2025-04".into(), 28);
        assert_eq!(lg.state, LeagueState::Scheduled);
        assert_eq!(lg.rounds, 28);
        assert!(lg.completed_at.is_none());
    }
}
