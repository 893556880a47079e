//! Price samples produced by the two acquisition feeds.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which feed a price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    /// Network-polled minute bars (authoritative history).
    Reference,
    /// Text extracted from the on-screen price ladder.
    Extracted,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "REFERENCE"),
            Self::Extracted => write!(f, "EXTRACTED"),
        }
    }
}

/// A single price reading. Transient: only used to derive the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub value: f64,
    pub source: PriceSource,
    pub captured_at: NaiveDateTime,
}

impl PriceSample {
    pub fn new(value: f64, source: PriceSource, captured_at: NaiveDateTime) -> Self {
        Self {
            value,
            source,
            captured_at,
        }
    }

    /// Age of the sample relative to `now`, saturating at zero for clock skew.
    pub fn age(&self, now: NaiveDateTime) -> chrono::Duration {
        let age = now - self.captured_at;
        if age < chrono::Duration::zero() {
            chrono::Duration::zero()
        } else {
            age
        }
    }
}
