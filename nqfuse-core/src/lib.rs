//! NQ Fuse Core: bars, splicing, indicators, scoring and price extraction.
//!
//! This crate contains everything that does not own a thread:
//! - Domain types (bars, price samples, instrument tick, screen regions)
//! - The time-series store with reference merge and live-price splice
//! - Opening-range tracking and higher-timeframe resampling
//! - The multi-timeframe indicator engine
//! - Declarative bias and confluence scoring rules
//! - Price extraction and region location over capture/recognition traits
//! - The reference-feed provider trait and its Yahoo implementation

pub mod analysis;
pub mod clock;
pub mod data;
pub mod domain;
pub mod extraction;
pub mod indicators;
pub mod scoring;
pub mod series;
