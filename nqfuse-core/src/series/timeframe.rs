//! Higher-timeframe views built by bucketing the base minute series.

use crate::domain::Bar;
use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown timeframe '{0}' (expected one of 5m, 15m, 60m, 4h)")]
pub struct TimeframeParseError(pub String);

/// Bucket widths the engine derives from the base series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M5,
    M15,
    M60,
    H4,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Self::M5, Self::M15, Self::M60, Self::H4];

    pub fn minutes(self) -> u32 {
        match self {
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M60 => 60,
            Self::H4 => 240,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M60 => "60m",
            Self::H4 => "4h",
        }
    }

    /// Start of the bucket containing `ts`, aligned on multiples of the width
    /// counted from local midnight.
    pub fn bucket_start(self, ts: NaiveDateTime) -> NaiveDateTime {
        let minute_of_day = ts.hour() * 60 + ts.minute();
        let offset = minute_of_day % self.minutes();
        let floored = ts.date().and_hms_opt(ts.hour(), ts.minute(), 0).unwrap_or(ts);
        floored - Duration::minutes(i64::from(offset))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "60m" | "1h" => Ok(Self::M60),
            "4h" | "240m" => Ok(Self::H4),
            other => Err(TimeframeParseError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.label().to_string()
    }
}

/// Aggregate base bars into `tf` buckets: first open, max high, min low, last
/// close, summed volume. Buckets with no base bars do not appear. Input must be
/// sorted ascending (as any store snapshot is).
pub fn resample(bars: &[Bar], tf: Timeframe) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    for bar in bars.iter().filter(|b| !b.is_void()) {
        let start = tf.bucket_start(bar.ts);
        match out.last_mut() {
            Some(bucket) if bucket.ts == start => {
                bucket.high = bucket.high.max(bar.high);
                bucket.low = bucket.low.min(bar.low);
                bucket.close = bar.close;
                bucket.volume = bucket.volume.saturating_add(bar.volume);
            }
            _ => out.push(Bar { ts: start, ..*bar }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn bar(ts: NaiveDateTime, o: f64, h: f64, l: f64, c: f64, v: u64) -> Bar {
        Bar {
            ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        }
    }

    #[test]
    fn bucket_alignment() {
        assert_eq!(Timeframe::M5.bucket_start(at(9, 33)), at(9, 30));
        assert_eq!(Timeframe::M15.bucket_start(at(9, 44)), at(9, 30));
        assert_eq!(Timeframe::M60.bucket_start(at(9, 59)), at(9, 0));
        assert_eq!(Timeframe::H4.bucket_start(at(11, 5)), at(8, 0));
    }

    #[test]
    fn resample_aggregates_ohlcv() {
        let bars = vec![
            bar(at(9, 30), 10.0, 12.0, 9.0, 11.0, 5),
            bar(at(9, 31), 11.0, 15.0, 10.0, 14.0, 7),
            bar(at(9, 34), 14.0, 14.5, 8.0, 9.0, 1),
            bar(at(9, 35), 9.0, 9.5, 8.5, 9.25, 2),
        ];
        let out = resample(&bars, Timeframe::M5);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], bar(at(9, 30), 10.0, 15.0, 8.0, 9.0, 13));
        assert_eq!(out[1], bar(at(9, 35), 9.0, 9.5, 8.5, 9.25, 2));
    }

    #[test]
    fn resample_drops_empty_buckets() {
        let bars = vec![
            bar(at(9, 30), 1.0, 1.0, 1.0, 1.0, 1),
            bar(at(10, 45), 2.0, 2.0, 2.0, 2.0, 1),
        ];
        let out = resample(&bars, Timeframe::M15);
        assert_eq!(out.iter().map(|b| b.ts).collect::<Vec<_>>(), vec![at(9, 30), at(10, 45)]);
    }

    #[test]
    fn parse_and_serde_labels() {
        assert_eq!("4h".parse::<Timeframe>(), Ok(Timeframe::H4));
        assert!("7m".parse::<Timeframe>().is_err());
        let json = serde_json::to_string(&Timeframe::ALL).unwrap();
        assert_eq!(json, r#"["5m","15m","60m","4h"]"#);
        let back: Vec<Timeframe> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Timeframe::ALL.to_vec());
    }
}
