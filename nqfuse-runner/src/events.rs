//! Notifications published by the fused engine.
//!
//! Events travel over a bounded `mpsc` channel. Sending never blocks a worker:
//! when the receiver has fallen behind and the buffer is full, or when it has
//! been dropped, the event is discarded.

use chrono::NaiveDateTime;
use nqfuse_core::domain::PriceSource;
use nqfuse_core::scoring::{Bias, ScoreResult};
use nqfuse_core::series::OpeningRange;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use tracing::debug;

/// Buffered events before new ones are dropped.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    PriceUpdated {
        price: f64,
        source: PriceSource,
        at: NaiveDateTime,
    },
    BiasUpdated(ScoreResult),
    ConfluenceUpdated(ScoreResult),
    OpeningRangeUpdated(OpeningRange),
    BiasChanged {
        from: Option<Bias>,
        to: Bias,
        score: u8,
        at: NaiveDateTime,
    },
    /// Non-fatal problem worth showing to a user.
    Warning(String),
}

/// Cloneable sending half handed to every worker.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Option<SyncSender<EngineEvent>>,
}

impl EventSender {
    /// Sender that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: EngineEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(dropped)) => {
                debug!(event = ?dropped, "event buffer full; dropping event");
            }
        }
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(EngineEvent::Warning(message.into()));
    }
}

/// A connected sender/receiver pair buffering [`DEFAULT_CAPACITY`] events.
pub fn channel() -> (EventSender, Receiver<EngineEvent>) {
    bounded(DEFAULT_CAPACITY)
}

/// A connected pair holding at most `capacity` undelivered events.
pub fn bounded(capacity: usize) -> (EventSender, Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (EventSender { tx: Some(tx) }, rx)
}
