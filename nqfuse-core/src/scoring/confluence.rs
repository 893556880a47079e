//! Cross-timeframe confluence score.
//!
//! Layers higher-timeframe biases, the base row's indicators, the opening range,
//! a stochastic cross and a volume confirmation into one bounded score. The rule
//! order and weights are fixed; two scorers fed the same frames agree exactly,
//! reasons included.

use super::bias::{view_biases, BiasScorer};
use super::rule::{
    bear_stack, ge, gt, le, lt, partial_bear_stack, Clause, RuleGroup, RuleSet, ScoreContext,
};
use super::{Bias, ScoreResult, NEUTRAL_SCORE};
use crate::analysis::IndicatorFrame;
use crate::series::{OpeningRange, Timeframe};

/// Below this many base bars the score is a fixed "warming up" result.
pub const CONFLUENCE_MIN_BARS: usize = 30;
/// Reasons kept for display. The score always reflects every applied rule.
pub const MAX_REASONS: usize = 8;
/// Higher-timeframe weights, longest first.
pub const VIEW_WEIGHTS: [(Timeframe, f64); 3] = [
    (Timeframe::H4, 15.0),
    (Timeframe::M60, 10.0),
    (Timeframe::M15, 8.0),
];
/// A bullish higher timeframe moves the score by this fraction of its weight.
pub const BULLISH_VIEW_FACTOR: f64 = 0.7;

const VOLUME_WINDOW: usize = 20;
const VOLUME_SURGE: f64 = 1.5;

pub struct ConfluenceScorer {
    bias: BiasScorer,
    rules: RuleSet,
}

impl ConfluenceScorer {
    pub fn new() -> Self {
        Self {
            bias: BiasScorer::new(),
            rules: confluence_rules(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn evaluate(
        &self,
        base: &IndicatorFrame,
        views: &[IndicatorFrame],
        opening_range: OpeningRange,
    ) -> ScoreResult {
        if base.len() < CONFLUENCE_MIN_BARS {
            return ScoreResult::not_ready();
        }
        let Some(row) = base.last_row() else {
            return ScoreResult::not_ready();
        };

        let views = view_biases(&self.bias, views)
            .into_iter()
            .map(|v| (v.timeframe, v.result.bias))
            .collect();
        let avg_volume = (base.len() >= VOLUME_WINDOW).then(|| {
            base.tail_volumes(VOLUME_WINDOW).map(|v| v as f64).sum::<f64>() / VOLUME_WINDOW as f64
        });

        let ctx = ScoreContext {
            row,
            views,
            opening_range,
            avg_volume,
        };
        let (raw, mut reasons) = self.rules.apply(&ctx, NEUTRAL_SCORE);
        reasons.truncate(MAX_REASONS);
        ScoreResult::from_raw(raw, reasons)
    }
}

impl Default for ConfluenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn confluence_rules() -> RuleSet {
    let mut groups: Vec<RuleGroup> = VIEW_WEIGHTS
        .iter()
        .map(|&(tf, weight)| {
            RuleGroup::new(
                format!("view_{tf}"),
                vec![
                    Clause::new(weight, format!("{tf} bearish trend"), move |c, _| {
                        c.view_bias(tf) == Some(Bias::Bearish)
                    }),
                    Clause::new(
                        -weight * BULLISH_VIEW_FACTOR,
                        format!("{tf} bullish trend"),
                        move |c, _| c.view_bias(tf) == Some(Bias::Bullish),
                    ),
                ],
            )
        })
        .collect();

    groups.extend([
        RuleGroup::new(
            "ema",
            vec![
                Clause::new(8.0, "Complete bear EMA stack", |c, _| bear_stack(&c.row)),
                Clause::new(4.0, "Partial bear EMA stack", |c, _| partial_bear_stack(&c.row)),
            ],
        ),
        RuleGroup::new(
            "macd",
            vec![Clause::new(5.0, "MACD bearish momentum", |c, _| {
                lt(c.row.macd, c.row.macd_signal) && lt(c.row.macd_hist, Some(0.0))
            })],
        ),
        RuleGroup::new(
            "rsi",
            vec![
                Clause::new(6.0, "RSI overbought (>70)", |c, _| ge(c.row.rsi, Some(70.0))),
                Clause::new(3.0, "RSI elevated (>60)", |c, _| ge(c.row.rsi, Some(60.0))),
                Clause::new(-4.0, "RSI oversold (<30)", |c, _| le(c.row.rsi, Some(30.0))),
            ],
        ),
        RuleGroup::new(
            "bollinger",
            vec![
                Clause::new(6.0, "Price above upper Bollinger Band", |c, _| {
                    gt(c.row.close, c.row.bb_upper)
                }),
                Clause::new(-3.0, "Price below lower Bollinger Band", |c, _| {
                    lt(c.row.close, c.row.bb_lower)
                }),
            ],
        ),
        RuleGroup::new(
            "vwap",
            vec![
                Clause::new(4.0, "Below session VWAP", |c, _| lt(c.row.close, c.row.vwap)),
                Clause::new(-2.0, "Above session VWAP", |c, _| ge(c.row.close, c.row.vwap)),
            ],
        ),
        RuleGroup::new(
            "opening_range",
            vec![
                Clause::new(8.0, "Opening Range low break", |c, _| {
                    c.opening_range.ready && lt(c.row.close, c.opening_range.low)
                }),
                Clause::new(-5.0, "Opening Range high break", |c, _| {
                    c.opening_range.ready && gt(c.row.close, c.opening_range.high)
                }),
            ],
        ),
        RuleGroup::new(
            "stochastic",
            vec![Clause::new(4.0, "Stochastic bear cross from overbought", |c, _| {
                lt(c.row.stoch_k, c.row.stoch_d) && gt(c.row.stoch_k, Some(80.0))
            })],
        ),
        RuleGroup::new(
            "volume",
            vec![Clause::new(3.0, "High volume confirms bear signal", |c, score| {
                c.avg_volume
                    .is_some_and(|avg| c.row.volume as f64 > avg * VOLUME_SURGE && score > NEUTRAL_SCORE)
            })],
        ),
    ]);

    RuleSet::new(groups)
}
