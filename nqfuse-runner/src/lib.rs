//! NQ Fuse Runner: feed workers, the fused feed controller and the
//! coordinating engine.
//!
//! This crate builds on `nqfuse-core` to provide:
//! - TOML configuration with strict key checking and region persistence
//! - Stop-signalled polling workers on named threads
//! - The reference feed (provider polling) and extraction feed (ladder reading
//!   with periodic relocation)
//! - The coordinator that merges, splices, computes and scores each cycle
//! - Lock-free snapshot publication, engine events and a bias-transition history

pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod extraction_feed;
pub mod history;
pub mod reference_feed;
pub mod worker;

pub use config::{ConfigError, ConfigStore, FusionConfig, MemoryConfigStore, TomlConfigStore};
pub use controller::FeedController;
pub use engine::{Collaborators, Coordinator, EngineError, FusionEngine, FusionSnapshot};
pub use events::{EngineEvent, EventSender};
pub use extraction_feed::{ExtractionFeed, ExtractionParts, RelocationDecision, RelocationPolicy};
pub use history::{SignalEntry, SignalHistory};
pub use reference_feed::{ReferenceBatch, ReferenceFeed};
pub use worker::{PollWorker, StopSignal};
