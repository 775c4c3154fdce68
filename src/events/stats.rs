//! Lock-free dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IgnoreReason, Observer};
use crate::error::HandlerError;
use crate::handler::HandlerInfo;
use crate::message::Message;

/// Observer that counts every lifecycle callback
#[derive(Debug, Default)]
pub struct StatsObserver {
    scheduled: AtomicU64,
    ignored_no_handler: AtomicU64,
    ignored_too_many_calls: AtomicU64,
    started: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of a [`StatsObserver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatsSnapshot {
    pub scheduled: u64,
    pub ignored_no_handler: u64,
    pub ignored_too_many_calls: u64,
    pub started: u64,
    pub finished: u64,
    pub failed: u64,
    pub panicked: u64,
    pub captured_at: DateTime<Utc>,
}

impl DispatchStatsSnapshot {
    pub fn ignored(&self) -> u64 {
        self.ignored_no_handler + self.ignored_too_many_calls
    }

    /// Runs that have started but not yet finished at capture time
    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(self.finished)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "scheduled": self.scheduled,
            "ignored": {
                "no_handler": self.ignored_no_handler,
                "too_many_calls": self.ignored_too_many_calls,
            },
            "started": self.started,
            "finished": self.finished,
            "failed": self.failed,
            "panicked": self.panicked,
            "in_flight": self.in_flight(),
            "captured_at": self.captured_at.to_rfc3339(),
        })
    }
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            ignored_no_handler: self.ignored_no_handler.load(Ordering::Relaxed),
            ignored_too_many_calls: self.ignored_too_many_calls.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            captured_at: Utc::now(),
        }
    }
}

impl Observer for StatsObserver {
    fn before_dispatch(&self, _message: &dyn Message, _handler: &HandlerInfo, _strategy: &str) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    fn event_ignored(&self, _message: &dyn Message, _strategy: &str, reason: IgnoreReason) {
        match reason {
            IgnoreReason::NoHandler => self.ignored_no_handler.fetch_add(1, Ordering::Relaxed),
            IgnoreReason::TooManyCalls => {
                self.ignored_too_many_calls.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    fn before_run(&self, _message: &dyn Message, _handler: &HandlerInfo) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn after_run(&self, _message: &dyn Message, _handler: &HandlerInfo) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }

    fn on_error(&self, error: &HandlerError, _message: &dyn Message, _handler: &HandlerInfo) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if error.is_panic() {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }
}
