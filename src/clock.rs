//! Time source injected into the lending service.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Supplies the current time
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    /// Time reported by [`Clock::now`]
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Start at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: Mutex::new(start) }
    }

    /// Move forward by `delta`, saturating at the largest representable time
    pub fn advance(&self, delta: TimeDelta) {
        let mut current = self.current.lock();
        *current = current.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Move forward by whole days
    pub fn advance_days(&self, days: i64) {
        self.advance(TimeDelta::days(days));
    }

    /// Jump to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
