//! Bias and confluence scoring.
//!
//! Both scorers are pure: indicator frames in, [`ScoreResult`] out. Tracking the
//! previous bias to detect transitions is the caller's job.

pub mod bias;
pub mod confluence;
pub mod rule;

pub use bias::{view_biases, BiasScorer, TimeframeBias};
pub use confluence::ConfluenceScorer;
pub use rule::{Clause, RuleGroup, RuleSet, ScoreContext};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Neutral starting score of both scorers.
pub const NEUTRAL_SCORE: f64 = 50.0;
/// Scores at or above this are bearish.
pub const BEARISH_AT: u8 = 65;
/// Scores at or below this are bullish.
pub const BULLISH_AT: u8 = 35;

/// Directional label. The scale leans short: high scores are bearish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bearish,
    Bullish,
    #[default]
    Neutral,
}

impl Bias {
    pub fn from_score(score: u8) -> Self {
        if score >= BEARISH_AT {
            Self::Bearish
        } else if score <= BULLISH_AT {
            Self::Bullish
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearish => write!(f, "BEARISH"),
            Self::Bullish => write!(f, "BULLISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub reasons: Vec<String>,
    pub bias: Bias,
    /// False when the input was too short to score; the result is then neutral
    /// with no reasons.
    pub ready: bool,
}

impl ScoreResult {
    pub fn not_ready() -> Self {
        Self {
            score: NEUTRAL_SCORE as u8,
            reasons: Vec::new(),
            bias: Bias::Neutral,
            ready: false,
        }
    }

    /// Truncate toward zero, clamp to [0, 100] and label.
    pub fn from_raw(raw: f64, reasons: Vec<String>) -> Self {
        let score = if raw.is_finite() {
            raw.trunc().clamp(0.0, 100.0) as u8
        } else {
            NEUTRAL_SCORE as u8
        };
        Self {
            score,
            reasons,
            bias: Bias::from_score(score),
            ready: true,
        }
    }
}

impl Default for ScoreResult {
    fn default() -> Self {
        Self::not_ready()
    }
}
