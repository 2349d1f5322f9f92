//! Injectable time source
//!
//! Stores never call `Utc::now()` directly; they ask a [`Clock`]. Tests use
//! [`ManualClock`] to step time across TTL boundaries without sleeping.

use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.advance(Duration::milliseconds(1500));
        assert_eq!(clock.now() - start, Duration::milliseconds(1500));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::default();
        let target = DateTime::UNIX_EPOCH + Duration::days(3);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
