//! The canonical mutable minute-bar series and the splice of live prices into it.
//!
//! Keyed by minute timestamp in a `BTreeMap`, so the series is always sorted and
//! free of duplicate minutes regardless of merge order. Only the coordinating
//! worker owns a `TimeSeries`; everyone else gets a [`TimeSeries::snapshot`] copy.

use crate::domain::{floor_to_minute, Bar};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Outcome of splicing a live price into the current minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceOutcome {
    /// The current minute's bar existed and its close/high/low were updated.
    Updated,
    /// A new bar was synthesised for the current minute.
    Created,
    /// Nothing to splice against (empty store).
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TimeSeries {
    bars: BTreeMap<NaiveDateTime, Bar>,
    limit: usize,
}

impl TimeSeries {
    /// Empty series retaining at most `limit` most recent bars.
    pub fn new(limit: usize) -> Self {
        Self {
            bars: BTreeMap::new(),
            limit: limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.values().next_back()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.last().map(|b| b.close)
    }

    pub fn get(&self, ts: NaiveDateTime) -> Option<&Bar> {
        self.bars.get(&floor_to_minute(ts))
    }

    /// Merge reference bars, overwriting same-minute bars. Returns the number of
    /// bars inserted or replaced. Bars with NaN or inconsistent prices are ignored.
    pub fn merge_reference(&mut self, bars: &[Bar]) -> usize {
        let mut merged = 0;
        for bar in bars.iter().filter(|b| b.is_sane()) {
            let key = floor_to_minute(bar.ts);
            self.bars.insert(key, Bar { ts: key, ..*bar });
            merged += 1;
        }
        self.trim();
        merged
    }

    /// Splice a live price into the bar for the minute containing `now`.
    ///
    /// Only the newest minute, or a new minute after it, is ever touched: a
    /// `now` that falls before the newest bar is skipped. An existing bar gets
    /// `close = price` and high/low widened to include it. A new bar is
    /// synthesised from the newest bar's close as open, with zero volume.
    /// Repeating the same splice leaves the bar unchanged.
    pub fn splice(&mut self, price: f64, now: NaiveDateTime) -> SpliceOutcome {
        if !price.is_finite() {
            return SpliceOutcome::Skipped;
        }
        let minute = floor_to_minute(now);
        let Some(newest) = self.bars.values_mut().next_back() else {
            return SpliceOutcome::Skipped;
        };
        if minute < newest.ts {
            return SpliceOutcome::Skipped;
        }
        if minute == newest.ts {
            newest.close = price;
            newest.high = newest.high.max(price);
            newest.low = newest.low.min(price);
            return SpliceOutcome::Updated;
        }

        let prev_close = newest.close;

        self.bars.insert(
            minute,
            Bar {
                ts: minute,
                open: prev_close,
                high: prev_close.max(price),
                low: prev_close.min(price),
                close: price,
                volume: 0,
            },
        );
        self.trim();
        SpliceOutcome::Created
    }

    /// Point-in-time copy of the series, ascending by timestamp.
    pub fn snapshot(&self) -> Vec<Bar> {
        self.bars.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.values()
    }

    fn trim(&mut self) {
        while self.bars.len() > self.limit {
            self.bars.pop_first();
        }
    }
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self::new(10_000)
    }
}
