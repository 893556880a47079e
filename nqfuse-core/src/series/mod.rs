//! Bar series state: the spliced minute store, timeframe views, opening range.

pub mod opening_range;
pub mod store;
pub mod timeframe;

pub use opening_range::{OpeningRange, OpeningRangeTracker};
pub use store::{SpliceOutcome, TimeSeries};
pub use timeframe::{resample, Timeframe, TimeframeParseError};
