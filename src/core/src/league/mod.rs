pub mod fixture;
pub mod league;
pub mod slot;
pub mod standing;

pub use fixture::{Fixture, FixtureStatus, Score};
pub use league::{League, LeagueState, LifecycleError};
pub use slot::{Membership, Slot, SlotKind};
pub use standing::Standing;
