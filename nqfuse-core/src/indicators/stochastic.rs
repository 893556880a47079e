//! Stochastic oscillator.
//!
//! %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over `k_period` bars.
//! %D = SMA(%K, d_period).
//! A flat window (highest_high == lowest_low) yields NaN rather than infinity.
//! Lookback: k_period - 1 for %K, k_period + d_period - 2 for %D.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

pub const STOCH_K_PERIOD: usize = 14;
pub const STOCH_D_PERIOD: usize = 3;

#[derive(Debug, Clone)]
pub struct StochasticK {
    period: usize,
    name: String,
}

impl StochasticK {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Stochastic %K period must be >= 1");
        Self {
            period,
            name: format!("stoch_k_{period}"),
        }
    }
}

impl Indicator for StochasticK {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        percent_k(bars, self.period)
    }
}

#[derive(Debug, Clone)]
pub struct StochasticD {
    k_period: usize,
    d_period: usize,
    name: String,
}

impl StochasticD {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        assert!(k_period >= 1 && d_period >= 1, "Stochastic periods must be >= 1");
        Self {
            k_period,
            d_period,
            name: format!("stoch_d_{k_period}_{d_period}"),
        }
    }
}

impl Indicator for StochasticD {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.k_period + self.d_period - 2
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean(&percent_k(bars, self.k_period), self.d_period)
    }
}

fn percent_k(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &bars[i + 1 - period..=i];
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let range = highest - lowest;
        if !range.is_finite() || range <= 0.0 {
            continue;
        }
        result[i] = 100.0 * (bars[i].close - lowest) / range;
    }

    result
}
