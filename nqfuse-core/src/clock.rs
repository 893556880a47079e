//! Wall-clock access in the feed timezone.
//!
//! All bar timestamps are naive local times of the exchange feed (America/New_York
//! for CME index futures as quoted by Yahoo). Components never call `Utc::now()`
//! directly; they go through a [`Clock`] so tests can pin "now".

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

/// Source of the current time, expressed in the feed timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Real clock converting UTC to a fixed IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct FeedClock {
    tz: Tz,
}

impl FeedClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn new_york() -> Self {
        Self::new(chrono_tz::America::New_York)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Clock for FeedClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// Convert epoch seconds to a naive local time in `tz`.
pub fn epoch_to_local(epoch_secs: i64, tz: Tz) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(epoch_secs, 0).map(|utc| tz.from_utc_datetime(&utc.naive_utc()).naive_local())
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
