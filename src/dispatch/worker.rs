//! Dedicated sequential worker thread shared by the built-in strategies.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::ShutdownOutcome;
use crate::error::{BusError, BusResult};
use crate::handler::panic_message;

pub(crate) type Job = Box<dyn FnOnce(&WorkerContext) + Send + 'static>;

/// Handle a running job gets to its worker
pub(crate) struct WorkerContext {
    halted: Arc<AtomicBool>,
    interrupt: Receiver<()>,
}

impl WorkerContext {
    /// Sleep for `duration` unless the worker is force-stopped first
    ///
    /// Returns `false` when the pause was cut short.
    pub(crate) fn pause(&self, duration: Duration) -> bool {
        match self.interrupt.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// One thread draining an unbounded FIFO queue of jobs
///
/// Shutdown closes the queue; the thread exits once it has run everything
/// accepted before that point. A forced stop discards whatever is still
/// queued and interrupts [`WorkerContext::pause`], but cannot preempt a job
/// that is already executing.
pub(crate) struct SequentialWorker {
    name: String,
    queue: Mutex<Option<Sender<Job>>>,
    interrupt: Mutex<Option<Sender<()>>>,
    terminated: Receiver<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
    halted: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
}

impl SequentialWorker {
    pub(crate) fn spawn(name: impl Into<String>) -> BusResult<Self> {
        let name = name.into();
        let (queue_tx, queue_rx) = channel::unbounded::<Job>();
        let (interrupt_tx, interrupt_rx) = channel::bounded::<()>(0);
        let (terminated_tx, terminated_rx) = channel::bounded::<()>(0);
        let halted = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));

        let context = WorkerContext {
            halted: Arc::clone(&halted),
            interrupt: interrupt_rx,
        };
        let worker_queued = Arc::clone(&queued);
        let worker_name = name.clone();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // Dropped when the loop ends, which is what shutdown waits on.
                let _terminated = terminated_tx;
                run_loop(&worker_name, queue_rx, &context, &worker_queued);
            })
            .map_err(|source| BusError::WorkerSpawn {
                worker: name.clone(),
                source,
            })?;

        debug!(worker = %name, "Dispatch worker started");

        Ok(Self {
            name,
            queue: Mutex::new(Some(queue_tx)),
            interrupt: Mutex::new(Some(interrupt_tx)),
            terminated: terminated_rx,
            thread: Mutex::new(Some(thread)),
            halted,
            queued,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job; fails once shutdown has begun
    pub(crate) fn execute(&self, job: Job) -> BusResult<()> {
        let queue = self.queue.lock();
        let Some(sender) = queue.as_ref() else {
            return Err(self.stopped());
        };
        self.queued.fetch_add(1, Ordering::AcqRel);
        sender.send(job).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            self.stopped()
        })
    }

    /// Jobs accepted but not yet picked up by the thread
    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.queue.lock().is_none()
    }

    pub(crate) fn shutdown(&self, wait: bool, timeout: Duration) -> ShutdownOutcome {
        let Some(sender) = self.queue.lock().take() else {
            return ShutdownOutcome::AlreadyStopped;
        };
        // Closing the queue lets the thread exit once it is empty.
        drop(sender);

        if !wait {
            debug!(worker = %self.name, "Dispatch worker detached");
            return ShutdownOutcome::Detached;
        }

        match self.terminated.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                self.halted.store(true, Ordering::Release);
                drop(self.interrupt.lock().take());
                let abandoned = self.queued();
                warn!(
                    worker = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    abandoned = abandoned,
                    "Dispatch worker did not drain before timeout, forcing stop"
                );
                ShutdownOutcome::TimedOut { abandoned }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.lock().take() {
                    if thread.join().is_err() {
                        error!(worker = %self.name, "Dispatch worker thread panicked");
                    }
                }
                debug!(worker = %self.name, "Dispatch worker drained");
                ShutdownOutcome::Drained
            }
        }
    }

    fn stopped(&self) -> BusError {
        BusError::StrategyStopped {
            strategy: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for SequentialWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialWorker")
            .field("name", &self.name)
            .field("queued", &self.queued())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn run_loop(name: &str, queue: Receiver<Job>, context: &WorkerContext, queued: &AtomicUsize) {
    for job in queue.iter() {
        queued.fetch_sub(1, Ordering::AcqRel);
        if context.is_halted() {
            continue;
        }
        // Handler failures are already contained by the unit; this only
        // catches panicking observers so the worker survives them.
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| job(context))) {
            error!(
                worker = %name,
                panic = %panic_message(payload.as_ref()),
                "Dispatch job panicked outside its handler"
            );
        }
    }
    debug!(worker = %name, "Dispatch worker exiting");
}
