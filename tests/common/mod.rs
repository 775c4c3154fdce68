#![allow(dead_code)]

pub mod strategies;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use eventbus_core::{
    HandlerError, HandlerInfo, HandlerResult, IgnoreReason, Message, Observer,
};
use parking_lot::Mutex;

/// Sample payload published by UI-style tests
#[derive(Debug, Clone, PartialEq)]
pub struct BoardChanged {
    pub board: String,
    pub revision: u32,
}

impl Message for BoardChanged {}

impl BoardChanged {
    pub fn new(revision: u32) -> Self {
        Self {
            board: "main".to_string(),
            revision,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserChanged {
    pub user_id: u64,
}

impl Message for UserChanged {}

/// Payload nobody subscribes to
#[derive(Debug)]
pub struct Orphan;

impl Message for Orphan {}

/// One observer callback as seen by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Scheduled { message_type: String, strategy: String },
    Ignored { message_type: String, strategy: String, reason: IgnoreReason },
    Started { message_type: String },
    Finished { message_type: String },
    Failed { message_type: String, panicked: bool },
}

/// Observer that records every callback in arrival order
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Recorded) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }

    pub fn ignored(&self, reason: IgnoreReason) -> usize {
        self.count(|event| matches!(event, Recorded::Ignored { reason: r, .. } if *r == reason))
    }

    pub fn started(&self) -> usize {
        self.count(|event| matches!(event, Recorded::Started { .. }))
    }

    pub fn finished(&self) -> usize {
        self.count(|event| matches!(event, Recorded::Finished { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|event| matches!(event, Recorded::Failed { .. }))
    }

    fn push(&self, event: Recorded) {
        self.events.lock().push(event);
    }
}

fn short(message: &dyn Message) -> String {
    message.message_type().short_name().to_string()
}

impl Observer for RecordingObserver {
    fn before_dispatch(&self, message: &dyn Message, _handler: &HandlerInfo, strategy: &str) {
        self.push(Recorded::Scheduled {
            message_type: short(message),
            strategy: strategy.to_string(),
        });
    }

    fn event_ignored(&self, message: &dyn Message, strategy: &str, reason: IgnoreReason) {
        self.push(Recorded::Ignored {
            message_type: short(message),
            strategy: strategy.to_string(),
            reason,
        });
    }

    fn before_run(&self, message: &dyn Message, _handler: &HandlerInfo) {
        self.push(Recorded::Started {
            message_type: short(message),
        });
    }

    fn after_run(&self, message: &dyn Message, _handler: &HandlerInfo) {
        self.push(Recorded::Finished {
            message_type: short(message),
        });
    }

    fn on_error(&self, error: &HandlerError, message: &dyn Message, _handler: &HandlerInfo) {
        self.push(Recorded::Failed {
            message_type: short(message),
            panicked: error.is_panic(),
        });
    }
}

/// Shared invocation counter plus a closure handler that bumps it
pub fn counting_handler<M: Message>(
) -> (Arc<AtomicUsize>, impl Fn(&M) -> HandlerResult + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    (count, move |_: &M| -> HandlerResult {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
