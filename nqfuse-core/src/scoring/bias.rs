//! Single-row bias: scores the last row of one frame.

use super::rule::{bear_stack, bull_stack, ge, gt, le, lt, Clause, RuleGroup, RuleSet, ScoreContext};
use super::{ScoreResult, NEUTRAL_SCORE};
use crate::analysis::{IndicatorFrame, IndicatorRow};
use crate::series::Timeframe;
use serde::{Deserialize, Serialize};

/// Bias of one higher-timeframe view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeBias {
    pub timeframe: Timeframe,
    pub result: ScoreResult,
}

pub struct BiasScorer {
    rules: RuleSet,
}

impl BiasScorer {
    pub fn new() -> Self {
        Self {
            rules: single_row_rules(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Score one row. Missing indicator values simply keep their rules from firing.
    pub fn score_row(&self, row: &IndicatorRow) -> ScoreResult {
        let ctx = ScoreContext::for_row(*row);
        let (raw, reasons) = self.rules.apply(&ctx, NEUTRAL_SCORE);
        ScoreResult::from_raw(raw, reasons)
    }

    /// Score the last row of the base frame; not ready when its indicators
    /// have not been computed.
    pub fn evaluate(&self, frame: &IndicatorFrame) -> ScoreResult {
        if !frame.has_indicators() {
            return ScoreResult::not_ready();
        }
        match frame.last_row() {
            Some(row) => self.score_row(&row),
            None => ScoreResult::not_ready(),
        }
    }
}

impl Default for BiasScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-row bias of the last bucket of every non-empty view.
pub fn view_biases(scorer: &BiasScorer, views: &[IndicatorFrame]) -> Vec<TimeframeBias> {
    views
        .iter()
        .filter_map(|view| {
            let timeframe = view.timeframe()?;
            let row = view.last_row()?;
            Some(TimeframeBias {
                timeframe,
                result: scorer.score_row(&row),
            })
        })
        .collect()
}

fn single_row_rules() -> RuleSet {
    RuleSet::new(vec![
        RuleGroup::new(
            "ema",
            vec![
                Clause::new(10.0, "Complete bear EMA stack", |c, _| bear_stack(&c.row)),
                Clause::new(-10.0, "Complete bull EMA stack", |c, _| bull_stack(&c.row)),
                Clause::new(4.0, "Below fast EMA", |c, _| lt(c.row.close, c.row.ema9)),
                Clause::new(-4.0, "Above fast EMA", |c, _| gt(c.row.close, c.row.ema9)),
            ],
        ),
        RuleGroup::new(
            "vwap",
            vec![
                Clause::new(4.0, "Below VWAP", |c, _| lt(c.row.close, c.row.vwap)),
                Clause::new(-2.0, "Above VWAP", |c, _| ge(c.row.close, c.row.vwap)),
            ],
        ),
        RuleGroup::new(
            "macd",
            vec![
                Clause::new(4.0, "MACD bearish", |c, _| lt(c.row.macd, c.row.macd_signal)),
                Clause::new(-2.0, "MACD bullish", |c, _| ge(c.row.macd, c.row.macd_signal)),
            ],
        ),
        RuleGroup::new(
            "rsi",
            vec![
                Clause::new(6.0, "RSI overbought", |c, _| ge(c.row.rsi, Some(70.0))),
                Clause::new(-4.0, "RSI oversold", |c, _| le(c.row.rsi, Some(30.0))),
            ],
        ),
        RuleGroup::new(
            "bollinger",
            vec![
                Clause::new(6.0, "Outside upper band", |c, _| gt(c.row.close, c.row.bb_upper)),
                Clause::new(-3.0, "Outside lower band", |c, _| lt(c.row.close, c.row.bb_lower)),
            ],
        ),
    ])
}
