//! # Dispatch Strategies
//!
//! A [`DispatchStrategy`] decides how, when and whether a handler runs for a
//! published message. The bus hands it one [`DispatchUnit`] per
//! (message, handler) pair together with the observer sink; the strategy runs
//! the unit now, later, or drops it.
//!
//! ## Built-in Strategies
//!
//! - [`BackgroundStrategy`]: one dedicated worker thread, FIFO queue, every unit
//!   runs in submission order.
//! - [`DebounceStrategy`]: at most one unit pending or running; bursts are
//!   dropped and each accepted run occupies at least the configured window.
//!
//! Both are built on a private sequential worker that owns the thread and the
//! queue and implements the shared shutdown protocol: stop accepting work,
//! optionally wait for the queue to drain up to a timeout, then force-stop.

pub mod background;
pub mod debounce;
mod worker;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BusResult;
use crate::events::Observer;
use crate::handler::{ErasedHandler, HandlerInfo};
use crate::message::{Message, MessageType};

pub use background::BackgroundStrategy;
pub use debounce::DebounceStrategy;

/// Execution policy for handler invocations
pub trait DispatchStrategy: Send + Sync {
    /// Name reported to observers and used for the worker thread
    fn name(&self) -> &str;

    /// Accept, defer or drop `unit`
    ///
    /// Must not block on handler execution. Returns
    /// [`BusError::StrategyStopped`](crate::BusError::StrategyStopped) once
    /// the strategy has been shut down.
    fn dispatch(&self, unit: DispatchUnit, sink: Arc<dyn Observer>) -> BusResult<()>;

    /// Stop accepting work and, if `wait` is set, wait up to `timeout` for
    /// pending work to finish before force-stopping the rest
    fn shutdown(&self, wait: bool, timeout: Duration) -> ShutdownOutcome;

    fn is_shutdown(&self) -> bool;
}

/// A single handler invocation waiting to be run by a strategy
#[derive(Clone)]
pub struct DispatchUnit {
    message: Arc<dyn Message>,
    handler: Arc<dyn ErasedHandler>,
}

impl DispatchUnit {
    pub(crate) fn new(message: Arc<dyn Message>, handler: Arc<dyn ErasedHandler>) -> Self {
        Self { message, handler }
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    pub fn message_type(&self) -> MessageType {
        self.handler.info().message_type
    }

    pub fn handler(&self) -> &HandlerInfo {
        self.handler.info()
    }

    /// Run the handler with the full notification sequence
    ///
    /// `before_run`, the handler, `on_error` if it failed, then `after_run`.
    /// Handler failures end here; the return value only tells the caller
    /// whether the handler succeeded.
    pub fn run(&self, sink: &dyn Observer) -> bool {
        let message = self.message.as_ref();
        let info = self.handler.info();

        sink.before_run(message, info);
        let succeeded = match self.handler.invoke(message) {
            Ok(()) => true,
            Err(error) => {
                sink.on_error(&error, message, info);
                false
            }
        };
        sink.after_run(message, info);
        succeeded
    }
}

impl fmt::Debug for DispatchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchUnit")
            .field("message", &self.message)
            .field("handler", self.handler.info())
            .finish()
    }
}

/// How a strategy's shutdown concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShutdownOutcome {
    /// All accepted work ran to completion
    Drained,
    /// Shutdown did not wait; accepted work keeps running in the background
    Detached,
    /// The timeout elapsed; `abandoned` queued units were discarded
    TimedOut { abandoned: usize },
    /// The strategy had already been shut down
    AlreadyStopped,
}

impl ShutdownOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ShutdownOutcome::TimedOut { .. })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;

    #[test]
    fn test_run_reports_full_sequence_on_failure() {
        let log = EventLog::default();
        let failing = unit(Job(7), |_| Err(anyhow::anyhow!("nope")));

        assert!(!failing.run(&log));
        assert_eq!(log.entries(), vec!["before:7", "error:7", "after:7"]);
    }

    #[test]
    fn test_run_skips_on_error_for_success() {
        let log = EventLog::default();
        let ok = unit(Job(1), |_| Ok(()));

        assert!(ok.run(&log));
        assert_eq!(log.entries(), vec!["before:1", "after:1"]);
        assert_eq!(ok.handler().message_type.short_name(), "Job");
    }
}
