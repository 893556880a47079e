//! Opening-range tracking: high/low of the first minutes after the session open.

use crate::domain::Bar;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Published opening-range state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OpeningRange {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub ready: bool,
}

impl OpeningRange {
    /// Range with known bounds, e.g. supplied on the command line.
    pub fn fixed(high: f64, low: f64) -> Self {
        Self {
            high: Some(high),
            low: Some(low),
            ready: true,
        }
    }
}

/// Recomputes the opening range each cycle until the window closes, then
/// freezes it for the rest of that session date.
#[derive(Debug, Clone)]
pub struct OpeningRangeTracker {
    session_open: NaiveTime,
    window: Duration,
    date: Option<NaiveDate>,
    state: OpeningRange,
}

impl OpeningRangeTracker {
    pub fn new(session_open: NaiveTime, minutes: u32) -> Self {
        Self {
            session_open,
            window: Duration::minutes(i64::from(minutes)),
            date: None,
            state: OpeningRange::default(),
        }
    }

    pub fn state(&self) -> OpeningRange {
        self.state
    }

    /// Update from the current bar series. Returns true when the published state changed.
    pub fn update(&mut self, bars: &[Bar], now: NaiveDateTime) -> bool {
        let today = now.date();
        let before = self.state;

        if self.date != Some(today) {
            self.date = Some(today);
            self.state = OpeningRange::default();
        }
        if self.state.ready {
            return false;
        }

        let start = today.and_time(self.session_open);
        let end = start + self.window;

        let mut high: Option<f64> = None;
        let mut low: Option<f64> = None;
        for bar in bars.iter().filter(|b| b.ts >= start && b.ts <= end) {
            high = Some(high.map_or(bar.high, |h| h.max(bar.high)));
            low = Some(low.map_or(bar.low, |l| l.min(bar.low)));
        }

        if high.is_some() {
            self.state.high = high;
            self.state.low = low;
            self.state.ready = now >= end;
        }

        self.state != before
    }
}
