use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum price increment of the NQ future.
pub const NQ_TICK_SIZE: f64 = 0.25;

/// Instrument metadata: the symbol the reference feed is polled for and its tick size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub tick_size: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum InstrumentError {
    #[error("tick size must be positive and finite, got {0}")]
    InvalidTickSize(f64),
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, tick_size: f64) -> Result<Self, InstrumentError> {
        if !(tick_size.is_finite() && tick_size > 0.0) {
            return Err(InstrumentError::InvalidTickSize(tick_size));
        }
        Ok(Self {
            symbol: symbol.into(),
            tick_size,
        })
    }

    /// Nasdaq-100 E-mini continuous contract as quoted by Yahoo.
    pub fn nq() -> Self {
        Self {
            symbol: "NQ=F".to_string(),
            tick_size: NQ_TICK_SIZE,
        }
    }

    /// Round a price to the nearest tick.
    pub fn snap(&self, price: f64) -> f64 {
        (price / self.tick_size).round() * self.tick_size
    }

    /// Whether a price is an exact multiple of the tick size.
    pub fn is_on_tick(&self, price: f64) -> bool {
        let ticks = price / self.tick_size;
        (ticks - ticks.round()).abs() < 1e-9
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self::nq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_rounds_to_nearest_quarter() {
        let nq = Instrument::nq();
        assert_eq!(nq.snap(18000.1), 18000.0);
        assert_eq!(nq.snap(18000.13), 18000.25);
        assert_eq!(nq.snap(18000.6), 18000.5);
        assert_eq!(nq.snap(18000.88), 18001.0);
    }

    #[test]
    fn snapped_prices_are_on_tick() {
        let nq = Instrument::nq();
        for raw in [17999.99, 18000.37, 18123.62, 2000.01] {
            assert!(nq.is_on_tick(nq.snap(raw)), "{raw} did not snap onto a tick");
        }
        assert!(!nq.is_on_tick(18000.1));
    }

    #[test]
    fn rejects_non_positive_tick() {
        assert_eq!(
            Instrument::new("ES=F", 0.0),
            Err(InstrumentError::InvalidTickSize(0.0))
        );
        assert!(Instrument::new("ES=F", f64::NAN).is_err());
        assert!(Instrument::new("ES=F", 0.25).is_ok());
    }
}
