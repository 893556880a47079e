//! Reference-feed provider trait and structured error types.
//!
//! The ReferenceProvider trait abstracts over the network source of authoritative
//! minute bars so the feed worker can be driven by a scripted provider in tests.

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for reference-feed fetches.
///
/// All of these are transient from the feed worker's point of view: it logs
/// them and treats the cycle as "no new data".
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Source of intraday minute bars for one instrument.
pub trait ReferenceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Minute bars of `session` (feed-local date), pre/post market included,
    /// ascending. An empty vector is a valid answer outside trading hours.
    fn fetch_intraday(&self, symbol: &str, session: NaiveDate) -> Result<Vec<Bar>, DataError>;
}
