pub mod calendar;
pub mod round_robin;

pub use calendar::*;
pub use round_robin::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid day key '{0}', expected yyyy-mm-dd")]
    InvalidDayKey(String),
}
