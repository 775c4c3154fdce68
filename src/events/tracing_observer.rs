//! Observer that reports lifecycle callbacks as structured `tracing` events.
//!
//! The bus itself stays quiet; registering this observer is how an embedding
//! application gets dispatch activity into its logs.

use std::backtrace::Backtrace;

use tracing::{debug, error, trace, warn};

use super::{IgnoreReason, Observer};
use crate::error::HandlerError;
use crate::handler::HandlerInfo;
use crate::message::Message;

#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    capture_backtraces: bool,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the publisher's backtrace to every ignored-message event
    ///
    /// `event_ignored(NoHandler)` runs on the publishing thread, so the
    /// captured trace points at the code that published the dropped message.
    pub fn with_backtraces(mut self, enabled: bool) -> Self {
        self.capture_backtraces = enabled;
        self
    }
}

impl Observer for TracingObserver {
    fn before_dispatch(&self, message: &dyn Message, handler: &HandlerInfo, strategy: &str) {
        trace!(
            message_type = %message.message_type(),
            handler = %handler.name,
            handler_id = %handler.id,
            strategy = %strategy,
            "Dispatch scheduled"
        );
    }

    fn event_ignored(&self, message: &dyn Message, strategy: &str, reason: IgnoreReason) {
        if self.capture_backtraces {
            let backtrace = Backtrace::force_capture();
            let publisher = std::thread::current();
            warn!(
                message_type = %message.message_type(),
                strategy = %strategy,
                reason = %reason,
                thread = publisher.name().unwrap_or("<unnamed>"),
                backtrace = %backtrace,
                "Message ignored"
            );
        } else {
            debug!(
                message_type = %message.message_type(),
                strategy = %strategy,
                reason = %reason,
                "Message ignored"
            );
        }
    }

    fn before_run(&self, message: &dyn Message, handler: &HandlerInfo) {
        let worker = std::thread::current();
        debug!(
            message_type = %message.message_type(),
            handler = %handler.name,
            thread = worker.name().unwrap_or("<unnamed>"),
            "Handler starting"
        );
    }

    fn after_run(&self, message: &dyn Message, handler: &HandlerInfo) {
        debug!(
            message_type = %message.message_type(),
            handler = %handler.name,
            "Handler finished"
        );
    }

    fn on_error(&self, error: &HandlerError, message: &dyn Message, handler: &HandlerInfo) {
        error!(
            message_type = %message.message_type(),
            handler = %handler.name,
            handler_id = %handler.id,
            panicked = error.is_panic(),
            error = %error,
            "Handler failed"
        );
    }
}
