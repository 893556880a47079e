//! The coordinating engine: sole writer of the bar store.
//!
//! Each cycle reads the feeds' latest values, merges and splices them into the
//! store, recomputes the indicator frames and scores, and publishes a
//! [`FusionSnapshot`] plus a point-in-time copy of the bars. Readers never see
//! the store itself.

use crate::config::{ConfigError, ConfigStore, FusionConfig};
use crate::controller::FeedController;
use crate::events::{EngineEvent, EventSender};
use crate::extraction_feed::{ExtractionFeed, ExtractionParts, RelocationPolicy};
use crate::history::{SignalEntry, SignalHistory};
use crate::reference_feed::{ReferenceBatch, ReferenceFeed};
use crate::worker::PollWorker;
use arc_swap::ArcSwap;
use chrono::NaiveDateTime;
use nqfuse_core::analysis::IndicatorEngine;
use nqfuse_core::clock::Clock;
use nqfuse_core::data::ReferenceProvider;
use nqfuse_core::domain::{floor_to_minute, Bar, PriceSample, PriceSource, Region};
use nqfuse_core::extraction::{
    ExtractorError, PriceExtractor, RegionLocator, ScreenCapture, TextRecognizer,
};
use nqfuse_core::scoring::{
    view_biases, Bias, BiasScorer, ConfluenceScorer, ScoreResult, TimeframeBias,
};
use nqfuse_core::series::{OpeningRange, OpeningRangeTracker, SpliceOutcome, TimeSeries};
use serde::Serialize;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] io::Error),
}

/// Everything published after one coordinating cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FusionSnapshot {
    /// Price of record and where it came from.
    pub price: Option<PriceSample>,
    pub bias: ScoreResult,
    pub confluence: ScoreResult,
    pub opening_range: OpeningRange,
    pub bar_count: usize,
    pub timeframes: Vec<TimeframeBias>,
    pub cycle_at: Option<NaiveDateTime>,
}

/// Single-threaded cycle logic. Owns the store, the opening-range tracker and
/// the last published bias.
pub struct Coordinator {
    store: TimeSeries,
    opening_range: OpeningRangeTracker,
    engine: IndicatorEngine,
    bias: BiasScorer,
    confluence: ConfluenceScorer,
    max_extraction_age: chrono::Duration,
    last_seq: u64,
    /// Newest bar the reference feed has delivered; spliced bars never land here.
    last_reference: Option<Bar>,
    last_bias: Option<Bias>,
    history: SignalHistory,
}

impl Coordinator {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            store: TimeSeries::new(config.history_limit),
            opening_range: OpeningRangeTracker::new(config.session_open, config.or_minutes),
            engine: IndicatorEngine::new(config.timeframes.clone()),
            bias: BiasScorer::new(),
            confluence: ConfluenceScorer::new(),
            max_extraction_age: config.extraction_max_age(),
            last_seq: 0,
            last_reference: None,
            last_bias: None,
            history: SignalHistory::new(config.signal_history),
        }
    }

    pub fn store(&self) -> &TimeSeries {
        &self.store
    }

    pub fn history(&self) -> &SignalHistory {
        &self.history
    }

    pub fn last_bias(&self) -> Option<Bias> {
        self.last_bias
    }

    /// Merge a reference batch unless it was merged before.
    fn merge(&mut self, batch: &ReferenceBatch) {
        if batch.seq <= self.last_seq {
            return;
        }
        let merged = self.store.merge_reference(&batch.bars);
        self.last_seq = batch.seq;
        let newest = batch
            .bars
            .iter()
            .filter(|b| b.is_sane())
            .max_by_key(|b| b.ts)
            .map(|b| Bar { ts: floor_to_minute(b.ts), ..*b });
        if let Some(bar) = newest {
            if !self.last_reference.is_some_and(|prev| prev.ts > bar.ts) {
                self.last_reference = Some(bar);
            }
        }
        debug!(seq = batch.seq, merged, total = self.store.len(), "merged reference batch");
    }

    /// Fresh extracted price spliced into the current minute, else the close of
    /// the newest reference bar (never a spliced close).
    fn price_of_record(
        &mut self,
        extracted: Option<PriceSample>,
        now: NaiveDateTime,
    ) -> Option<PriceSample> {
        if let Some(sample) = extracted.filter(|s| s.age(now) <= self.max_extraction_age) {
            if self.store.splice(sample.value, now) != SpliceOutcome::Skipped {
                return Some(sample);
            }
        }
        self.last_reference
            .map(|bar| PriceSample::new(bar.close, PriceSource::Reference, bar.ts))
    }

    pub fn cycle(
        &mut self,
        reference: Option<&ReferenceBatch>,
        extracted: Option<PriceSample>,
        now: NaiveDateTime,
        events: &EventSender,
    ) -> FusionSnapshot {
        if let Some(batch) = reference {
            self.merge(batch);
        }

        let price = self.price_of_record(extracted, now);
        if let Some(p) = price {
            events.emit(EngineEvent::PriceUpdated {
                price: p.value,
                source: p.source,
                at: now,
            });
        }

        let bars = self.store.snapshot();
        if self.opening_range.update(&bars, now) {
            events.emit(EngineEvent::OpeningRangeUpdated(self.opening_range.state()));
        }
        let opening_range = self.opening_range.state();

        if bars.is_empty() {
            return FusionSnapshot {
                price,
                opening_range,
                cycle_at: Some(now),
                ..FusionSnapshot::default()
            };
        }

        let bar_count = bars.len();
        let analysis = self.engine.analyze(bars);
        let bias = self.bias.evaluate(&analysis.base);
        let timeframes = view_biases(&self.bias, &analysis.views);
        let confluence = self
            .confluence
            .evaluate(&analysis.base, &analysis.views, opening_range);

        events.emit(EngineEvent::BiasUpdated(bias.clone()));
        events.emit(EngineEvent::ConfluenceUpdated(confluence.clone()));
        if bias.ready {
            self.track_transition(&bias, now, events);
        }

        FusionSnapshot {
            price,
            bias,
            confluence,
            opening_range,
            bar_count,
            timeframes,
            cycle_at: Some(now),
        }
    }

    fn track_transition(&mut self, result: &ScoreResult, now: NaiveDateTime, events: &EventSender) {
        if self.last_bias == Some(result.bias) {
            return;
        }
        let from = self.last_bias.replace(result.bias);
        info!(from = ?from, to = %result.bias, score = result.score, "bias changed");
        events.emit(EngineEvent::BiasChanged {
            from,
            to: result.bias,
            score: result.score,
            at: now,
        });
        self.history.push(SignalEntry {
            at: now,
            bias: result.bias,
            score: result.score,
            key_reason: result.reasons.first().cloned(),
        });
    }
}

/// External collaborators a live session is wired to.
pub struct Collaborators {
    pub provider: Arc<dyn ReferenceProvider>,
    pub capture: Arc<dyn ScreenCapture>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub store: Arc<dyn ConfigStore>,
    pub clock: Arc<dyn Clock>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Published {
    snapshot: ArcSwap<FusionSnapshot>,
    bars: ArcSwap<Vec<Bar>>,
    history: ArcSwap<Vec<SignalEntry>>,
}

/// Feeds plus the coordinating worker.
pub struct FusionEngine {
    controller: Arc<FeedController>,
    coordinator: Arc<Mutex<Coordinator>>,
    published: Arc<Published>,
    clock: Arc<dyn Clock>,
    events: EventSender,
    worker: PollWorker,
}

impl FusionEngine {
    pub fn new(
        config: &FusionConfig,
        parts: Collaborators,
        events: EventSender,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let extractor = PriceExtractor::new(config.instrument()?, config.extractor_settings())?;

        let reference = ReferenceFeed::new(
            parts.provider,
            config.symbol.clone(),
            Arc::clone(&parts.clock),
            config.reference_poll(),
            events.clone(),
        );
        let extraction = ExtractionFeed::new(
            ExtractionParts {
                capture: parts.capture,
                recognizer: parts.recognizer,
                extractor,
                locator: RegionLocator::new(config.search_right_px, config.recognition_mode()),
                policy: RelocationPolicy::new(
                    chrono::Duration::seconds(config.relocate_interval_secs as i64),
                    chrono::Duration::seconds(config.relocate_grace_secs as i64),
                ),
                initial_region: Some(config.region),
                store: parts.store,
                clock: Arc::clone(&parts.clock),
                events: events.clone(),
            },
            config.extraction_poll(),
        );

        Ok(Self {
            controller: Arc::new(FeedController::new(reference, extraction)),
            coordinator: Arc::new(Mutex::new(Coordinator::new(config))),
            published: Arc::new(Published {
                snapshot: ArcSwap::from_pointee(FusionSnapshot::default()),
                bars: ArcSwap::from_pointee(Vec::new()),
                history: ArcSwap::from_pointee(Vec::new()),
            }),
            clock: parts.clock,
            events,
            worker: PollWorker::new("nqfuse-coordinator", config.cycle()),
        })
    }

    /// Start feeds and the coordinating worker. Idempotent.
    pub fn start(&self) -> Result<(), EngineError> {
        self.controller.start()?;
        let controller = Arc::clone(&self.controller);
        let coordinator = Arc::clone(&self.coordinator);
        let published = Arc::clone(&self.published);
        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();
        self.worker.start(move || {
            run_cycle(&controller, &coordinator, &published, clock.now(), &events);
        })?;
        Ok(())
    }

    /// Stop the coordinator first, then the feeds. Idempotent.
    pub fn stop(&self) {
        self.worker.stop();
        self.controller.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Run one coordinating cycle on the calling thread.
    pub fn step(&self) -> Arc<FusionSnapshot> {
        run_cycle(
            &self.controller,
            &self.coordinator,
            &self.published,
            self.clock.now(),
            &self.events,
        );
        self.snapshot()
    }

    pub fn snapshot(&self) -> Arc<FusionSnapshot> {
        self.published.snapshot.load_full()
    }

    /// Point-in-time copy of the bar series as of the last cycle.
    pub fn bars(&self) -> Arc<Vec<Bar>> {
        self.published.bars.load_full()
    }

    pub fn signal_history(&self) -> Arc<Vec<SignalEntry>> {
        self.published.history.load_full()
    }

    pub fn controller(&self) -> &FeedController {
        &self.controller
    }

    pub fn set_region(&self, region: Region) {
        self.controller.set_region(region);
    }

    pub fn request_relocation(&self) {
        self.controller.request_relocation();
    }
}

impl Drop for FusionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_cycle(
    controller: &FeedController,
    coordinator: &Mutex<Coordinator>,
    published: &Published,
    now: NaiveDateTime,
    events: &EventSender,
) {
    let reference = controller.latest_reference();
    let extracted = controller.latest_extracted();

    let mut coordinator = lock(coordinator);
    let snapshot = coordinator.cycle(reference.as_deref(), extracted, now, events);
    let bars = coordinator.store().snapshot();
    let history = coordinator.history().to_vec();
    drop(coordinator);

    published.bars.store(Arc::new(bars));
    published.history.store(Arc::new(history));
    published.snapshot.store(Arc::new(snapshot));
}
