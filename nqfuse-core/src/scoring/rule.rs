//! Declarative scoring rules.
//!
//! A [`RuleSet`] is an ordered list of [`RuleGroup`]s. Each group is an ordered
//! list of mutually exclusive [`Clause`]s: the first clause whose predicate holds
//! adds its weight and reason, and the rest of the group is skipped. Groups run in
//! order and predicates see the running score, so the volume rule can require the
//! score to already lean bearish.

use super::Bias;
use crate::analysis::IndicatorRow;
use crate::series::{OpeningRange, Timeframe};

/// Everything a predicate may look at.
#[derive(Debug, Clone, Default)]
pub struct ScoreContext {
    pub row: IndicatorRow,
    /// Bias of the last bucket of each higher timeframe view.
    pub views: Vec<(Timeframe, Bias)>,
    pub opening_range: OpeningRange,
    /// Mean volume over the last 20 base bars, when at least 20 exist.
    pub avg_volume: Option<f64>,
}

impl ScoreContext {
    pub fn for_row(row: IndicatorRow) -> Self {
        Self {
            row,
            ..Self::default()
        }
    }

    pub fn view_bias(&self, tf: Timeframe) -> Option<Bias> {
        self.views.iter().find(|(t, _)| *t == tf).map(|(_, b)| *b)
    }
}

type Predicate = Box<dyn Fn(&ScoreContext, f64) -> bool + Send + Sync>;

pub struct Clause {
    weight: f64,
    reason: String,
    predicate: Predicate,
}

impl Clause {
    pub fn new(
        weight: f64,
        reason: impl Into<String>,
        predicate: impl Fn(&ScoreContext, f64) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            weight,
            reason: reason.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

pub struct RuleGroup {
    name: String,
    clauses: Vec<Clause>,
}

impl RuleGroup {
    pub fn new(name: impl Into<String>, clauses: Vec<Clause>) -> Self {
        Self {
            name: name.into(),
            clauses,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    fn fire(&self, ctx: &ScoreContext, score: f64) -> Option<&Clause> {
        self.clauses.iter().find(|c| (c.predicate)(ctx, score))
    }
}

#[derive(Default)]
pub struct RuleSet {
    groups: Vec<RuleGroup>,
}

impl RuleSet {
    pub fn new(groups: Vec<RuleGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    /// Apply every group to `start`. Returns the raw (unclamped) score and the
    /// reasons in evaluation order.
    pub fn apply(&self, ctx: &ScoreContext, start: f64) -> (f64, Vec<String>) {
        let mut score = start;
        let mut reasons = Vec::new();
        for group in &self.groups {
            if let Some(clause) = group.fire(ctx, score) {
                score += clause.weight;
                reasons.push(clause.reason.clone());
            }
        }
        (score, reasons)
    }
}

/// `a < b`, false when either side is not ready.
pub fn lt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

/// `a > b`, false when either side is not ready.
pub fn gt(a: Option<f64>, b: Option<f64>) -> bool {
    lt(b, a)
}

/// `a >= b`, false when either side is not ready.
pub fn ge(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a >= b)
}

/// `a <= b`, false when either side is not ready.
pub fn le(a: Option<f64>, b: Option<f64>) -> bool {
    ge(b, a)
}

/// close < ema9 < ema21 < ema50
pub fn bear_stack(row: &IndicatorRow) -> bool {
    lt(row.close, row.ema9) && partial_bear_stack(row)
}

/// close > ema9 > ema21 > ema50
pub fn bull_stack(row: &IndicatorRow) -> bool {
    gt(row.close, row.ema9) && gt(row.ema9, row.ema21) && gt(row.ema21, row.ema50)
}

/// ema9 < ema21 < ema50
pub fn partial_bear_stack(row: &IndicatorRow) -> bool {
    lt(row.ema9, row.ema21) && lt(row.ema21, row.ema50)
}
