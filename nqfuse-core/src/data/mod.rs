//! Reference-feed data sources.

pub mod provider;
pub mod yahoo;

pub use provider::{DataError, ReferenceProvider};
pub use yahoo::YahooProvider;
