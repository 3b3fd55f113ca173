//! Clock port - 時刻の抽象化
//!
//! The engine reads "now" for timeout checks and processed stamps; the
//! store reads it to resolve purge cutoffs. Tests pin it with [`FixedClock`].

use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::domain::timexpr;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock (whole seconds).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        timexpr::truncate(Utc::now())
    }
}

/// FixedClock はテスト用に時刻を固定
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at: Mutex::new(timexpr::truncate(at)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut guard) = self.at.lock() {
            *guard = timexpr::truncate(at);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.at.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_can_be_moved() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2016, 10, 4, 0, 0, 0).unwrap());
        assert_eq!(clock.now().to_rfc3339(), "2016-10-04T00:00:00+00:00");
        clock.set(Utc.with_ymd_and_hms(2016, 10, 5, 0, 0, 0).unwrap());
        assert_eq!(clock.now().to_rfc3339(), "2016-10-05T00:00:00+00:00");
    }

    #[test]
    fn system_clock_has_no_subseconds() {
        assert_eq!(SystemClock.now().timestamp_subsec_nanos(), 0);
    }
}
