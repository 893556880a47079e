//! Indicator-bearing bar frames and the per-bar rows the scorers read.

use crate::domain::Bar;
use crate::indicators::IndicatorValues;
use crate::series::Timeframe;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Names under which the engine stores each indicator series.
pub mod keys {
    pub const EMA_FAST: &str = "ema_9";
    pub const EMA_MID: &str = "ema_21";
    pub const EMA_SLOW: &str = "ema_50";
    pub const MACD: &str = "macd_12_26_9";
    pub const MACD_SIGNAL: &str = "macd_signal_12_26_9";
    pub const MACD_HIST: &str = "macd_hist_12_26_9";
    pub const RSI: &str = "rsi_14";
    pub const STOCH_K: &str = "stoch_k_14";
    pub const STOCH_D: &str = "stoch_d_14_3";
    pub const BB_MIDDLE: &str = "bb_middle_20";
    pub const BB_UPPER: &str = "bb_upper_20";
    pub const BB_LOWER: &str = "bb_lower_20";
    pub const VWAP: &str = "vwap";
}

/// One bar plus every indicator value at that bar. `None` means "not ready".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ts: Option<NaiveDateTime>,
    pub close: Option<f64>,
    pub volume: u64,
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub ema50: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub vwap: Option<f64>,
}

impl IndicatorRow {
    fn read(bar: &Bar, values: &IndicatorValues, idx: usize) -> Self {
        Self {
            ts: Some(bar.ts),
            close: Some(bar.close).filter(|c| c.is_finite()),
            volume: bar.volume,
            ema9: values.value(keys::EMA_FAST, idx),
            ema21: values.value(keys::EMA_MID, idx),
            ema50: values.value(keys::EMA_SLOW, idx),
            macd: values.value(keys::MACD, idx),
            macd_signal: values.value(keys::MACD_SIGNAL, idx),
            macd_hist: values.value(keys::MACD_HIST, idx),
            rsi: values.value(keys::RSI, idx),
            stoch_k: values.value(keys::STOCH_K, idx),
            stoch_d: values.value(keys::STOCH_D, idx),
            bb_middle: values.value(keys::BB_MIDDLE, idx),
            bb_upper: values.value(keys::BB_UPPER, idx),
            bb_lower: values.value(keys::BB_LOWER, idx),
            vwap: values.value(keys::VWAP, idx),
        }
    }
}

/// A bar series with its computed indicator columns.
///
/// `timeframe` is `None` for the base minute series. A frame whose indicators
/// were not computed (too few bars) still carries its bars unmodified.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    timeframe: Option<Timeframe>,
    bars: Vec<Bar>,
    values: IndicatorValues,
}

impl IndicatorFrame {
    pub fn new(timeframe: Option<Timeframe>, bars: Vec<Bar>, values: IndicatorValues) -> Self {
        Self {
            timeframe,
            bars,
            values,
        }
    }

    /// Frame with bars only and no indicator columns.
    pub fn unmodified(timeframe: Option<Timeframe>, bars: Vec<Bar>) -> Self {
        Self::new(timeframe, bars, IndicatorValues::new())
    }

    pub fn timeframe(&self) -> Option<Timeframe> {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn values(&self) -> &IndicatorValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Whether indicator columns are present.
    pub fn has_indicators(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<IndicatorRow> {
        self.bars
            .get(idx)
            .map(|bar| IndicatorRow::read(bar, &self.values, idx))
    }

    pub fn last_row(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(1).and_then(|idx| self.row(idx))
    }

    /// Volumes of the last `n` bars (fewer if the frame is shorter).
    pub fn tail_volumes(&self, n: usize) -> impl Iterator<Item = u64> + '_ {
        let start = self.bars.len().saturating_sub(n);
        self.bars[start..].iter().map(|b| b.volume)
    }
}
