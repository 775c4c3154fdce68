//! Debounced dispatch: coalesce bursts into one run per window.
//!
//! ```text
//!            dispatch (accepted)
//!   Idle ───────────────────────────→ Busy ──┐ dispatch → event_ignored(TooManyCalls)
//!    ↑                                  │ ←──┘
//!    └── run + max(0, delay - run) ─────┘
//!
//!   shutdown → Stopped (dispatch fails with StrategyStopped)
//! ```
//!
//! The window is measured from the start of a run. A handler faster than the
//! delay keeps the strategy busy for the remainder; a handler slower than the
//! delay keeps it busy for exactly its own duration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use super::worker::SequentialWorker;
use super::{DispatchStrategy, DispatchUnit, ShutdownOutcome};
use crate::constants::DEFAULT_WORKER_NAME_PREFIX;
use crate::error::{BusError, BusResult};
use crate::events::{IgnoreReason, Observer};
use crate::message::{Message, MessageType};

static INSTANCE_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Runs at most one unit per `delay` window and drops everything in between
#[derive(Debug)]
pub struct DebounceStrategy {
    worker: SequentialWorker,
    delay: Duration,
    busy: Arc<AtomicBool>,
}

impl DebounceStrategy {
    pub fn new(delay: Duration) -> BusResult<Self> {
        Self::named(format!("{DEFAULT_WORKER_NAME_PREFIX}-debounce"), delay)
    }

    pub fn named(name: impl AsRef<str>, delay: Duration) -> BusResult<Self> {
        let sequence = INSTANCE_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
        let worker = SequentialWorker::spawn(format!("{}-{sequence}", name.as_ref()))?;
        Ok(Self {
            worker,
            delay,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn for_message<M: Message>(delay: Duration) -> BusResult<Self> {
        Self::named(
            format!("{}-debounce", MessageType::of::<M>().short_name()),
            delay,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a unit is pending, running, or inside its padding window
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Returns the strategy to idle when the padded run ends, even on panic
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DispatchStrategy for DebounceStrategy {
    fn name(&self) -> &str {
        self.worker.name()
    }

    fn dispatch(&self, unit: DispatchUnit, sink: Arc<dyn Observer>) -> BusResult<()> {
        if self.worker.is_shutdown() {
            return Err(BusError::StrategyStopped {
                strategy: self.name().to_string(),
            });
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(
                strategy = %self.name(),
                message_type = %unit.message_type(),
                "Debounce window active, dropping dispatch"
            );
            sink.event_ignored(unit.message(), self.name(), IgnoreReason::TooManyCalls);
            return Ok(());
        }

        let guard = BusyGuard(Arc::clone(&self.busy));
        let delay = self.delay;
        self.worker.execute(Box::new(move |context| {
            let _guard = guard;
            let started = Instant::now();
            unit.run(sink.as_ref());
            if let Some(remaining) = delay.checked_sub(started.elapsed()) {
                if !remaining.is_zero() && !context.is_halted() {
                    context.pause(remaining);
                }
            }
        }))
        // A rejected job is dropped together with its guard, which resets `busy`.
    }

    fn shutdown(&self, wait: bool, timeout: Duration) -> ShutdownOutcome {
        self.worker.shutdown(wait, timeout)
    }

    fn is_shutdown(&self) -> bool {
        self.worker.is_shutdown()
    }
}
