//! Minute bar, the unit the store and every indicator work on.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One-minute OHLCV bar, keyed by its minute-aligned timestamp in the feed timezone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Flat bar at a single price with zero volume.
    pub fn flat(ts: NaiveDateTime, price: f64) -> Self {
        Self {
            ts: floor_to_minute(ts),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }
    }

    /// Typical price used by VWAP: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Truncate a timestamp to the start of its minute.
pub fn floor_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            ts: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(9, 31, 0)
                .unwrap(),
            open: 18000.0,
            high: 18010.25,
            low: 17995.5,
            close: 18004.0,
            volume: 1200,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 17990.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn typical_price_averages_hlc() {
        let bar = sample_bar();
        let expected = (18010.25 + 17995.5 + 18004.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < 1e-9);
    }

    #[test]
    fn flat_bar_is_minute_aligned() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_milli_opt(9, 31, 42, 250)
            .unwrap();
        let bar = Bar::flat(ts, 18000.0);
        assert_eq!(bar.ts, ts.with_second(0).unwrap().with_nanosecond(0).unwrap());
        assert_eq!(bar.volume, 0);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
