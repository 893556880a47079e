//! Long-lived polling threads with a cooperative stop signal.
//!
//! A [`PollWorker`] runs one closure per cycle on a named thread and sleeps on a
//! [`StopSignal`] between cycles, so `stop()` wakes it immediately instead of
//! waiting out the cadence. A panicking cycle is logged and the loop carries on.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cancellable sleep shared between a worker and whoever stops it.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *lock(&self.stopped) = true;
        self.cv.notify_all();
    }

    /// Re-arm after a stop so the owner can be started again.
    pub fn reset(&self) {
        *lock(&self.stopped) = false;
    }

    pub fn is_stopped(&self) -> bool {
        *lock(&self.stopped)
    }

    /// Sleep up to `timeout`. Returns true if stopped (before or during the wait).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = lock(&self.stopped);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = match self.cv.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// A named thread running one cycle per cadence until stopped.
///
/// `start` while running and `stop` while idle are no-ops.
#[derive(Debug)]
pub struct PollWorker {
    name: String,
    cadence: Duration,
    signal: Arc<StopSignal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollWorker {
    pub fn new(name: impl Into<String>, cadence: Duration) -> Self {
        Self {
            name: name.into(),
            cadence,
            signal: Arc::new(StopSignal::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn is_running(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Spawn the loop. Returns `Ok(false)` when it was already running.
    pub fn start<F>(&self, mut cycle: F) -> io::Result<bool>
    where
        F: FnMut() + Send + 'static,
    {
        let mut handle = lock(&self.handle);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(false);
        }
        if let Some(finished) = handle.take() {
            let _ = finished.join();
        }
        self.signal.reset();

        let signal = Arc::clone(&self.signal);
        let name = self.name.clone();
        let cadence = self.cadence;
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            info!(worker = %name, "worker started");
            loop {
                if signal.is_stopped() {
                    break;
                }
                if panic::catch_unwind(AssertUnwindSafe(&mut cycle)).is_err() {
                    error!(worker = %name, "cycle panicked; continuing");
                }
                if signal.wait_timeout(cadence) {
                    break;
                }
            }
            info!(worker = %name, "worker stopped");
        })?;
        *handle = Some(spawned);
        Ok(true)
    }

    /// Signal the loop and join it. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let Some(handle) = lock(&self.handle).take() else {
            return false;
        };
        self.signal.stop();
        if handle.join().is_err() {
            debug!(worker = %self.name, "worker thread ended with a panic");
        }
        true
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
