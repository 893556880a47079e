//! Session Volume-Weighted Average Price.
//!
//! VWAP[t] = sum(typical_price * volume) / sum(volume), accumulated from the first
//! bar of the bar's calendar date. Zero-volume bars (e.g. spliced from extracted
//! prices) count as volume 1 so the denominator is never zero.
//! Lookback: 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Default)]
pub struct SessionVwap;

impl SessionVwap {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for SessionVwap {
    fn name(&self) -> &str {
        "vwap"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = Vec::with_capacity(bars.len());
        let mut session = None;
        let mut pv = 0.0;
        let mut vol = 0.0;

        for bar in bars {
            let date = bar.ts.date();
            if session != Some(date) {
                session = Some(date);
                pv = 0.0;
                vol = 0.0;
            }
            let volume = bar.volume.max(1) as f64;
            pv += bar.typical_price() * volume;
            vol += volume;
            result.push(pv / vol);
        }

        result
    }
}
