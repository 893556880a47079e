pub mod engine;
pub mod frame;

pub use engine::{Analysis, IndicatorEngine, MIN_BARS};
pub use frame::{keys, IndicatorFrame, IndicatorRow};
