//! Wall-clock time source.

use crate::ports::clock_port::Clock;
use chrono::{Local, NaiveDateTime};

/// Local time of the machine running the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
