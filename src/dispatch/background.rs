//! Immediate background dispatch: one worker, FIFO, nothing dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::worker::SequentialWorker;
use super::{DispatchStrategy, DispatchUnit, ShutdownOutcome};
use crate::constants::DEFAULT_WORKER_NAME_PREFIX;
use crate::error::BusResult;
use crate::events::Observer;
use crate::message::{Message, MessageType};

static INSTANCE_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Runs every unit on a dedicated worker thread in submission order
///
/// `dispatch` only enqueues, so publishers never wait for handlers. The bus
/// creates one instance as its default; give a message type its own instance
/// through `EventBus::configure_strategy` to run it on a separate thread.
#[derive(Debug)]
pub struct BackgroundStrategy {
    worker: SequentialWorker,
}

impl BackgroundStrategy {
    /// Strategy with a worker named `eventbus-background-<n>`
    pub fn new() -> BusResult<Self> {
        Self::named(format!("{DEFAULT_WORKER_NAME_PREFIX}-background"))
    }

    /// Strategy whose worker thread is named `<name>-<n>`
    pub fn named(name: impl AsRef<str>) -> BusResult<Self> {
        let sequence = INSTANCE_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
        let worker = SequentialWorker::spawn(format!("{}-{sequence}", name.as_ref()))?;
        Ok(Self { worker })
    }

    /// Strategy named after a message type, for per-type workers
    pub fn for_message<M: Message>() -> BusResult<Self> {
        Self::named(MessageType::of::<M>().short_name())
    }

    /// Units waiting in the queue
    pub fn queued(&self) -> usize {
        self.worker.queued()
    }
}

impl DispatchStrategy for BackgroundStrategy {
    fn name(&self) -> &str {
        self.worker.name()
    }

    fn dispatch(&self, unit: DispatchUnit, sink: Arc<dyn Observer>) -> BusResult<()> {
        trace!(
            strategy = %self.name(),
            message_type = %unit.message_type(),
            handler = %unit.handler().name,
            "Queueing dispatch unit"
        );
        self.worker.execute(Box::new(move |_| {
            unit.run(sink.as_ref());
        }))
    }

    fn shutdown(&self, wait: bool, timeout: Duration) -> ShutdownOutcome {
        self.worker.shutdown(wait, timeout)
    }

    fn is_shutdown(&self) -> bool {
        self.worker.is_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::BusError;
    use parking_lot::Mutex;

    #[test]
    fn test_units_run_in_order_with_notifications() {
        let strategy = BackgroundStrategy::new().unwrap();
        let log = Arc::new(EventLog::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 1..=3 {
            let order = Arc::clone(&order);
            let unit = unit(Job(i), move |job| {
                order.lock().push(job.0);
                Ok(())
            });
            strategy.dispatch(unit, log.clone()).unwrap();
        }

        assert_eq!(
            strategy.shutdown(true, Duration::from_secs(5)),
            ShutdownOutcome::Drained
        );
        assert_eq!(*order.lock(), vec![1, 2, 3]);
        assert_eq!(
            log.entries(),
            vec!["before:1", "after:1", "before:2", "after:2", "before:3", "after:3"]
        );
    }

    #[test]
    fn test_dispatch_returns_before_handler_runs() {
        let strategy = BackgroundStrategy::new().unwrap();
        let log = Arc::new(EventLog::default());

        let (release_tx, release_rx) = crossbeam::channel::bounded::<()>(0);

        strategy
            .dispatch(
                unit(Job(1), move |_| {
                    let _ = release_rx.recv_timeout(Duration::from_secs(5));
                    Ok(())
                }),
                log.clone(),
            )
            .unwrap();
        // The handler is parked on the channel, so it cannot have finished.
        assert!(!log.entries().contains(&"after:1".to_string()));

        release_tx.send(()).unwrap();
        strategy.shutdown(true, Duration::from_secs(5));
        assert_eq!(log.entries(), vec!["before:1", "after:1"]);
    }

    #[test]
    fn test_failure_does_not_stop_worker() {
        let strategy = BackgroundStrategy::new().unwrap();
        let log = Arc::new(EventLog::default());

        strategy
            .dispatch(unit(Job(1), |_| Err(anyhow::anyhow!("bad"))), log.clone())
            .unwrap();
        strategy
            .dispatch(unit(Job(2), |_| panic!("worse")), log.clone())
            .unwrap();
        strategy
            .dispatch(unit(Job(3), |_| Ok(())), log.clone())
            .unwrap();

        strategy.shutdown(true, Duration::from_secs(5));
        assert_eq!(
            log.entries(),
            vec![
                "before:1", "error:1", "after:1", "before:2", "error:2", "after:2", "before:3",
                "after:3",
            ]
        );
    }

    #[test]
    fn test_dispatch_after_shutdown_is_rejected() {
        let strategy = BackgroundStrategy::named("closed").unwrap();
        strategy.shutdown(true, Duration::from_secs(1));

        assert!(strategy.is_shutdown());
        let result = strategy.dispatch(unit(Job(1), |_| Ok(())), Arc::new(EventLog::default()));
        assert!(matches!(result, Err(BusError::StrategyStopped { strategy }) if strategy.starts_with("closed-")));
    }

    #[test]
    fn test_per_message_naming() {
        let strategy = BackgroundStrategy::for_message::<Job>().unwrap();
        assert!(strategy.name().starts_with("Job-"));
        strategy.shutdown(false, Duration::ZERO);
    }
}
