pub mod bots;
pub mod league;
pub mod r#match;
pub mod schedule;
pub mod team;
pub mod utils;

// Re-export league items
pub use league::{
    Fixture, FixtureStatus, League, LeagueState, LifecycleError, Membership, Score, Slot,
    SlotKind, Standing,
};

// Re-export schedule items
pub use schedule::{
    RoundRobinMode, ScheduleError, SlotPairing, TeamPairing, generate_slot_pairings,
    generate_team_pairings, round_count,
};

// Re-export team and bot items
pub use bots::{Bot, bot_team_id, synthesize_team};
pub use team::{Lineup, PlayerAttributes, PlayerRecord, SquadRole, Team};

// Re-export match items
pub use r#match::{GoalEvent, MatchPlan, MatchSide, MatchSpec, PlanSide, PlayerEntry, SpecSide};

pub use utils::*;
