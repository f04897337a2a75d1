pub mod rng;

use std::time::Instant;
use uuid::Uuid;

pub struct TimeEstimation;

impl TimeEstimation {
    pub fn estimate<T, F: FnOnce() -> T>(action: F) -> (T, u128) {
        let now = Instant::now();
        let result = action();
        (result, now.elapsed().as_millis())
    }
}

pub struct IdUtils;

impl IdUtils {
    /// Mints a new document id in the compact uuid format used across collections.
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}
