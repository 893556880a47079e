//! Multi-timeframe indicator computation.
//!
//! The base minute series gets the full indicator set once it has at least
//! [`MIN_BARS`] bars; below that the bars come back unmodified. Each configured
//! higher timeframe is resampled from the base bars and gets its own
//! self-contained EMA/MACD/RSI/Bollinger set, computed in parallel.

use super::frame::IndicatorFrame;
use crate::domain::Bar;
use crate::indicators::bollinger::{BOLLINGER_MULT, BOLLINGER_PERIOD};
use crate::indicators::rsi::RSI_PERIOD;
use crate::indicators::stochastic::{STOCH_D_PERIOD, STOCH_K_PERIOD};
use crate::indicators::{
    Bollinger, Ema, Indicator, IndicatorValues, Macd, MacdLine, Rsi, SessionVwap, StochasticD,
    StochasticK,
};
use crate::series::{resample, Timeframe};
use rayon::prelude::*;
use tracing::debug;

/// Minimum base bars before any indicator is computed.
pub const MIN_BARS: usize = 50;

/// Output of one engine pass: the base frame and one frame per higher timeframe.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub base: IndicatorFrame,
    pub views: Vec<IndicatorFrame>,
}

impl Analysis {
    pub fn view(&self, tf: Timeframe) -> Option<&IndicatorFrame> {
        self.views.iter().find(|v| v.timeframe() == Some(tf))
    }
}

pub struct IndicatorEngine {
    timeframes: Vec<Timeframe>,
    base_set: Vec<Box<dyn Indicator>>,
    view_set: Vec<Box<dyn Indicator>>,
}

impl IndicatorEngine {
    pub fn new(timeframes: Vec<Timeframe>) -> Self {
        Self {
            timeframes,
            base_set: base_indicators(),
            view_set: view_indicators(),
        }
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Indicators on the base series, or the series unmodified below [`MIN_BARS`].
    pub fn compute_base(&self, bars: Vec<Bar>) -> IndicatorFrame {
        if bars.len() < MIN_BARS {
            debug!(bars = bars.len(), min = MIN_BARS, "base series below indicator minimum");
            return IndicatorFrame::unmodified(None, bars);
        }
        let values = compute_set(&bars, &self.base_set);
        IndicatorFrame::new(None, bars, values)
    }

    /// Resample and compute one higher timeframe. No minimum bar count applies;
    /// values the bucket count cannot support are simply not ready.
    pub fn compute_view(&self, bars: &[Bar], tf: Timeframe) -> IndicatorFrame {
        let buckets = resample(bars, tf);
        let values = compute_set(&buckets, &self.view_set);
        IndicatorFrame::new(Some(tf), buckets, values)
    }

    /// All configured higher timeframes, computed in parallel.
    pub fn compute_views(&self, bars: &[Bar]) -> Vec<IndicatorFrame> {
        if bars.is_empty() {
            return Vec::new();
        }
        self.timeframes
            .par_iter()
            .map(|&tf| self.compute_view(bars, tf))
            .collect()
    }

    pub fn analyze(&self, bars: Vec<Bar>) -> Analysis {
        let views = self.compute_views(&bars);
        Analysis {
            base: self.compute_base(bars),
            views,
        }
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(Timeframe::ALL.to_vec())
    }
}

fn compute_set(bars: &[Bar], indicators: &[Box<dyn Indicator>]) -> IndicatorValues {
    let mut iv = IndicatorValues::new();
    for indicator in indicators {
        let series = indicator.compute(bars);
        debug_assert_eq!(
            series.len(),
            bars.len(),
            "indicator '{}' produced {} values for {} bars",
            indicator.name(),
            series.len(),
            bars.len()
        );
        iv.insert(indicator.name(), series);
    }
    iv
}

fn view_indicators() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(Ema::new(9)),
        Box::new(Ema::new(21)),
        Box::new(Ema::new(50)),
        Box::new(Macd::standard(MacdLine::Line)),
        Box::new(Macd::standard(MacdLine::Signal)),
        Box::new(Macd::standard(MacdLine::Histogram)),
        Box::new(Rsi::new(RSI_PERIOD)),
        Box::new(Bollinger::middle(BOLLINGER_PERIOD, BOLLINGER_MULT)),
        Box::new(Bollinger::upper(BOLLINGER_PERIOD, BOLLINGER_MULT)),
        Box::new(Bollinger::lower(BOLLINGER_PERIOD, BOLLINGER_MULT)),
    ]
}

fn base_indicators() -> Vec<Box<dyn Indicator>> {
    let mut set = view_indicators();
    set.push(Box::new(StochasticK::new(STOCH_K_PERIOD)));
    set.push(Box::new(StochasticD::new(STOCH_K_PERIOD, STOCH_D_PERIOD)));
    set.push(Box::new(SessionVwap::new()));
    set
}
