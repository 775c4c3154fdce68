//! Fan-out of lifecycle callbacks to the registered observers.

use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use super::{IgnoreReason, Observer};
use crate::error::HandlerError;
use crate::handler::HandlerInfo;
use crate::message::Message;

/// Ordered list of observers that is itself an [`Observer`]
///
/// Callbacks reach observers in insertion order. The observer list is
/// copy-on-write, so adding an observer never waits for a fan-out in
/// progress; the fan-out loops themselves are serialized by a reentrant lock,
/// which lets an observer publish from inside a callback on the same thread.
#[derive(Default)]
pub struct ObserverChain {
    observers: RwLock<Arc<Vec<Arc<dyn Observer>>>>,
    fan_out: ReentrantMutex<()>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn Observer>) {
        let mut observers = self.observers.write();
        Arc::make_mut(&mut observers).push(observer);
    }

    /// Remove every observer; callbacks already in progress finish normally
    pub fn clear(&self) {
        *self.observers.write() = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    fn broadcast(&self, notify: impl Fn(&dyn Observer)) {
        let observers = Arc::clone(&self.observers.read());
        if observers.is_empty() {
            return;
        }
        let _serialized = self.fan_out.lock();
        for observer in observers.iter() {
            notify(observer.as_ref());
        }
    }
}

impl std::fmt::Debug for ObserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverChain")
            .field("observers", &self.len())
            .finish()
    }
}

impl Observer for ObserverChain {
    fn before_dispatch(&self, message: &dyn Message, handler: &HandlerInfo, strategy: &str) {
        self.broadcast(|observer| observer.before_dispatch(message, handler, strategy));
    }

    fn event_ignored(&self, message: &dyn Message, strategy: &str, reason: IgnoreReason) {
        self.broadcast(|observer| observer.event_ignored(message, strategy, reason));
    }

    fn before_run(&self, message: &dyn Message, handler: &HandlerInfo) {
        self.broadcast(|observer| observer.before_run(message, handler));
    }

    fn after_run(&self, message: &dyn Message, handler: &HandlerInfo) {
        self.broadcast(|observer| observer.after_run(message, handler));
    }

    fn on_error(&self, error: &HandlerError, message: &dyn Message, handler: &HandlerInfo) {
        self.broadcast(|observer| observer.on_error(error, message, handler));
    }
}
