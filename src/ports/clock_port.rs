//! Wall-clock port used by the mid-session pricing rule.

use chrono::NaiveDateTime;

pub trait Clock {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
