//! Domain types for the fused price feed.

pub mod bar;
pub mod instrument;
pub mod region;
pub mod sample;

pub use bar::{floor_to_minute, Bar};
pub use instrument::{Instrument, InstrumentError, NQ_TICK_SIZE};
pub use region::{Region, RegionError};
pub use sample::{PriceSample, PriceSource};
