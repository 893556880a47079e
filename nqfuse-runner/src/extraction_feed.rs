//! Extraction feed: reads the on-screen price ladder through the capture and
//! recognition seams, keeps the capture region located, and publishes the
//! latest accepted price.
//!
//! Region location is confined to this feed's thread; the coordinator never
//! touches the region, so relocation cannot overlap a splice.

use crate::config::ConfigStore;
use crate::events::EventSender;
use crate::worker::PollWorker;
use arc_swap::ArcSwapOption;
use chrono::NaiveDateTime;
use nqfuse_core::clock::Clock;
use nqfuse_core::domain::{PriceSample, PriceSource, Region};
use nqfuse_core::extraction::{PriceExtractor, RegionLocator, ScreenCapture, TextRecognizer};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the extraction cycle should do about the region this time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationDecision {
    Locate,
    /// Due, but a recent successful read shows the region still works.
    SkipRecentSuccess,
    NotDue,
}

/// When to re-run the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationPolicy {
    pub interval: chrono::Duration,
    pub grace: chrono::Duration,
}

impl RelocationPolicy {
    pub fn new(interval: chrono::Duration, grace: chrono::Duration) -> Self {
        Self { interval, grace }
    }

    /// `last_locate` is the last time a relocation was due (run or skipped);
    /// `None` means the feed has not located yet.
    pub fn decide(
        &self,
        now: NaiveDateTime,
        last_locate: Option<NaiveDateTime>,
        last_success: Option<NaiveDateTime>,
    ) -> RelocationDecision {
        let Some(last_locate) = last_locate else {
            return RelocationDecision::Locate;
        };
        if now - last_locate <= self.interval {
            return RelocationDecision::NotDue;
        }
        match last_success {
            Some(ok) if now - ok <= self.grace => RelocationDecision::SkipRecentSuccess,
            _ => RelocationDecision::Locate,
        }
    }
}

impl Default for RelocationPolicy {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(30), chrono::Duration::seconds(3))
    }
}

#[derive(Debug, Default)]
struct Timing {
    last_locate: Option<NaiveDateTime>,
    last_success: Option<NaiveDateTime>,
}

/// Everything an extraction feed is built from.
pub struct ExtractionParts {
    pub capture: Arc<dyn ScreenCapture>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub extractor: PriceExtractor,
    pub locator: RegionLocator,
    pub policy: RelocationPolicy,
    pub initial_region: Option<Region>,
    pub store: Arc<dyn ConfigStore>,
    pub clock: Arc<dyn Clock>,
    pub events: EventSender,
}

struct Shared {
    capture: Arc<dyn ScreenCapture>,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: Mutex<PriceExtractor>,
    locator: RegionLocator,
    policy: RelocationPolicy,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    events: EventSender,
    region: ArcSwapOption<Region>,
    latest: ArcSwapOption<PriceSample>,
    relocate_requested: AtomicBool,
    timing: Mutex<Timing>,
}

impl Shared {
    fn locate(&self) -> Option<Region> {
        match self.locator.locate(self.capture.as_ref(), self.recognizer.as_ref()) {
            Some(region) => {
                self.region.store(Some(Arc::new(region)));
                Some(region)
            }
            None => {
                warn!("price column not found; keeping current region");
                self.events.warn("auto-locate found no price column");
                None
            }
        }
    }

    fn poll(&self) -> Option<f64> {
        let now = self.clock.now();

        let forced = self.relocate_requested.swap(false, Ordering::SeqCst);
        let decision = {
            let timing = lock(&self.timing);
            if forced {
                RelocationDecision::Locate
            } else {
                self.policy.decide(now, timing.last_locate, timing.last_success)
            }
        };
        match decision {
            RelocationDecision::Locate => {
                self.locate();
                lock(&self.timing).last_locate = Some(now);
            }
            RelocationDecision::SkipRecentSuccess => {
                debug!("relocation skipped; region read successfully moments ago");
                lock(&self.timing).last_locate = Some(now);
            }
            RelocationDecision::NotDue => {}
        }

        let region = self.region.load_full()?;
        let price = lock(&self.extractor).read(
            self.capture.as_ref(),
            self.recognizer.as_ref(),
            &region,
        )?;
        self.latest
            .store(Some(Arc::new(PriceSample::new(price, PriceSource::Extracted, now))));
        lock(&self.timing).last_success = Some(now);
        Some(price)
    }
}

/// Independently cadenced ladder reader.
pub struct ExtractionFeed {
    shared: Arc<Shared>,
    worker: PollWorker,
}

impl ExtractionFeed {
    pub fn new(parts: ExtractionParts, cadence: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                capture: parts.capture,
                recognizer: parts.recognizer,
                extractor: Mutex::new(parts.extractor),
                locator: parts.locator,
                policy: parts.policy,
                store: parts.store,
                clock: parts.clock,
                events: parts.events,
                region: ArcSwapOption::new(parts.initial_region.map(Arc::new)),
                latest: ArcSwapOption::empty(),
                relocate_requested: AtomicBool::new(false),
                timing: Mutex::new(Timing::default()),
            }),
            worker: PollWorker::new("nqfuse-extraction", cadence),
        }
    }

    /// One synchronous cycle: relocate if due, then read. `None` is "no reading".
    pub fn poll_once(&self) -> Option<f64> {
        self.shared.poll()
    }

    /// Latest accepted price with its capture time, without blocking.
    pub fn latest(&self) -> Option<PriceSample> {
        self.shared.latest.load_full().map(|s| *s)
    }

    pub fn region(&self) -> Option<Region> {
        self.shared.region.load_full().map(|r| *r)
    }

    /// Replace the region wholesale and persist it. The region is in effect
    /// even when persisting fails.
    pub fn set_region(&self, region: Region) {
        self.shared.region.store(Some(Arc::new(region)));
        info!(
            left = region.left(),
            top = region.top(),
            width = region.width(),
            height = region.height(),
            "capture region set"
        );
        if let Err(e) = self.shared.store.persist_region(region) {
            warn!(error = %e, "failed to persist capture region");
            self.shared.events.warn(format!("could not save region: {e}"));
        }
    }

    /// Force a locate on the next cycle.
    pub fn request_relocation(&self) {
        self.shared.relocate_requested.store(true, Ordering::SeqCst);
    }

    pub fn start(&self) -> io::Result<bool> {
        let shared = Arc::clone(&self.shared);
        self.worker.start(move || {
            shared.poll();
        })
    }

    pub fn stop(&self) -> bool {
        self.worker.stop()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}
