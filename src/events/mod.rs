//! # Dispatch Lifecycle Events
//!
//! Observers see every step a message takes through the bus:
//!
//! ```text
//! publish ──┬─ no handlers ─────────────→ event_ignored(NoHandler)
//!           └─ per handler: before_dispatch (publisher thread)
//!                 └─ strategy ─┬─ busy ──→ event_ignored(TooManyCalls)
//!                              └─ run ───→ before_run → handler → [on_error] → after_run
//! ```
//!
//! Every callback has a no-op default, so an observer implements only the
//! events it cares about. The bus fans callbacks out through an
//! [`ObserverChain`].

pub mod chain;
pub mod stats;
pub mod tracing_observer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::ignore_reasons;
use crate::error::HandlerError;
use crate::handler::HandlerInfo;
use crate::message::Message;

pub use chain::ObserverChain;
pub use stats::{DispatchStatsSnapshot, StatsObserver};
pub use tracing_observer::TracingObserver;

/// Why a message was not handed to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No handler was subscribed for the message type
    NoHandler,
    /// A debounced strategy was still busy with an earlier message
    TooManyCalls,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::NoHandler => ignore_reasons::NO_HANDLER,
            IgnoreReason::TooManyCalls => ignore_reasons::TOO_MANY_CALLS,
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of dispatch lifecycle callbacks
///
/// `before_dispatch` and `event_ignored(NoHandler)` run on the publishing
/// thread, which makes them suitable for measuring queueing latency or for
/// capturing the publisher's stack. The remaining callbacks run on the
/// strategy's worker.
#[allow(unused_variables)]
pub trait Observer: Send + Sync {
    /// A message is about to be handed to `strategy` for `handler`
    fn before_dispatch(&self, message: &dyn Message, handler: &HandlerInfo, strategy: &str) {}

    /// A message was dropped without running a handler
    fn event_ignored(&self, message: &dyn Message, strategy: &str, reason: IgnoreReason) {}

    /// A handler is about to run
    fn before_run(&self, message: &dyn Message, handler: &HandlerInfo) {}

    /// A handler finished, successfully or not
    fn after_run(&self, message: &dyn Message, handler: &HandlerInfo) {}

    /// A handler failed; reported between `before_run` and `after_run`
    fn on_error(&self, error: &HandlerError, message: &dyn Message, handler: &HandlerInfo) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_reason_strings() {
        assert_eq!(IgnoreReason::NoHandler.to_string(), "no handler");
        assert_eq!(IgnoreReason::TooManyCalls.as_str(), "too many calls");
        assert_eq!(
            serde_json::to_string(&IgnoreReason::TooManyCalls).unwrap(),
            "\"too_many_calls\""
        );
    }
}
