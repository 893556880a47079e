//! Reference feed: polls the provider for today's minute bars and publishes
//! each successful fetch as an immutable batch.

use crate::events::EventSender;
use crate::worker::PollWorker;
use arc_swap::ArcSwapOption;
use chrono::NaiveDateTime;
use nqfuse_core::clock::Clock;
use nqfuse_core::data::ReferenceProvider;
use nqfuse_core::domain::Bar;
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One successful fetch. `seq` increases by one per published batch so the
/// coordinator merges each batch exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceBatch {
    pub seq: u64,
    pub fetched_at: NaiveDateTime,
    pub bars: Vec<Bar>,
}

impl ReferenceBatch {
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

struct Shared {
    provider: Arc<dyn ReferenceProvider>,
    symbol: String,
    clock: Arc<dyn Clock>,
    events: EventSender,
    latest: ArcSwapOption<ReferenceBatch>,
    seq: AtomicU64,
}

impl Shared {
    fn poll(&self) -> bool {
        let now = self.clock.now();
        match self.provider.fetch_intraday(&self.symbol, now.date()) {
            Ok(bars) if bars.is_empty() => {
                debug!(symbol = %self.symbol, "reference feed returned no bars");
                false
            }
            Ok(bars) => {
                let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(symbol = %self.symbol, seq, bars = bars.len(), "reference batch");
                self.latest.store(Some(Arc::new(ReferenceBatch {
                    seq,
                    fetched_at: now,
                    bars,
                })));
                true
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "reference fetch failed");
                self.events.warn(format!("reference feed: {e}"));
                false
            }
        }
    }
}

/// Independently cadenced reference-bar poller.
pub struct ReferenceFeed {
    shared: Arc<Shared>,
    worker: PollWorker,
}

impl ReferenceFeed {
    pub fn new(
        provider: Arc<dyn ReferenceProvider>,
        symbol: impl Into<String>,
        clock: Arc<dyn Clock>,
        cadence: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                symbol: symbol.into(),
                clock,
                events,
                latest: ArcSwapOption::empty(),
                seq: AtomicU64::new(0),
            }),
            worker: PollWorker::new("nqfuse-reference", cadence),
        }
    }

    /// One synchronous fetch. Returns whether a new batch was published;
    /// failures leave the previous batch in place.
    pub fn poll_once(&self) -> bool {
        self.shared.poll()
    }

    /// Latest published batch, without blocking.
    pub fn latest(&self) -> Option<Arc<ReferenceBatch>> {
        self.shared.latest.load_full()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use chrono::NaiveDate;
    use nqfuse_core::clock::ManualClock;
    use nqfuse_core::data::DataError;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<Result<Vec<Bar>, DataError>>>);

    impl ReferenceProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch_intraday(&self, _symbol: &str, _session: NaiveDate) -> Result<Vec<Bar>, DataError> {
            let mut script = self.0.lock().unwrap();
            if script.is_empty() {
                Ok(Vec::new())
            } else {
                script.remove(0)
            }
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 45, 0)
            .unwrap()
    }

    #[test]
    fn failures_keep_the_previous_batch() {
        let bars = vec![Bar::flat(now(), 18000.0)];
        let provider = Arc::new(Scripted(Mutex::new(vec![
            Ok(bars.clone()),
            Err(DataError::NetworkUnreachable("down".into())),
            Ok(Vec::new()),
            Ok(bars.clone()),
        ])));
        let (tx, rx) = events::channel();
        let feed = ReferenceFeed::new(
            provider,
            "NQ=F",
            Arc::new(ManualClock::new(now())),
            Duration::from_secs(10),
            tx,
        );

        assert!(feed.latest().is_none());
        assert!(feed.poll_once());
        assert_eq!(feed.latest().unwrap().seq, 1);

        assert!(!feed.poll_once());
        assert!(!feed.poll_once());
        assert_eq!(feed.latest().unwrap().seq, 1);
        assert!(rx.try_iter().any(|e| matches!(e, crate::EngineEvent::Warning(_))));

        assert!(feed.poll_once());
        let batch = feed.latest().unwrap();
        assert_eq!(batch.seq, 2);
        assert_eq!(batch.last_close(), Some(18000.0));
    }
}
