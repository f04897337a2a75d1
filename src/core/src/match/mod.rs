pub mod plan;
pub mod spec;
pub mod timeline;

pub use plan::{MatchPlan, PlanSide};
pub use spec::{MatchSpec, PlayerEntry, SpecSide};
pub use timeline::{GoalEvent, MatchSide};
