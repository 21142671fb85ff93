// # Clock Trait
//
// Wall-clock source for the timestamps written to the remote document.
// Scheduling does not use this clock; it runs on tokio's monotonic timer.

use chrono::NaiveDateTime;

/// Source of the current local wall-clock time
pub trait Clock: Send + Sync {
    /// Current local time, without timezone
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
