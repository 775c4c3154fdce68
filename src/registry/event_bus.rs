//! # Event Bus
//!
//! Handler registry and publish entry point.
//!
//! ## Registry State
//!
//! - handler sets per [`MessageType`], stored as `Arc<Vec<_>>` and replaced
//!   copy-on-write, so a publish iterates a snapshot that concurrent
//!   subscribe/unsubscribe calls never touch
//! - a holder index (`HolderKey -> HandlerId`s) used only for bulk removal
//! - per-type strategy overrides, plus one lazily created default strategy
//! - the observer chain shared with every dispatched unit; shutdown swaps in
//!   a fresh chain, so late callbacks from abandoned work never reach
//!   observers added afterwards
//!
//! Structural mutations are serialized by a registration lock that is never
//! held while a handler or an observer runs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::shutdown::ShutdownReport;
use crate::config::BusConfig;
use crate::constants::DEFAULT_STRATEGY_NAME;
use crate::dispatch::{DispatchStrategy, DispatchUnit};
use crate::error::BusResult;
use crate::events::{IgnoreReason, Observer, ObserverChain};
use crate::handler::{
    ErasedHandler, Handler, HandlerId, HandlerInfo, HandlerResult, HolderKey, TypedHandler,
};
use crate::logging::log_bus_operation;
use crate::message::{Message, MessageType};

type HandlerSet = Arc<Vec<Arc<dyn ErasedHandler>>>;

/// In-process publish/subscribe registry
///
/// One bus per logical application, shared by reference (usually behind an
/// `Arc`). [`EventBus::shutdown`] stops every strategy and resets the bus to
/// its freshly constructed state, so the same instance can be used again.
pub struct EventBus {
    config: BusConfig,
    handlers: DashMap<MessageType, HandlerSet>,
    holders: DashMap<HolderKey, HashSet<HandlerId>>,
    strategies: DashMap<MessageType, Arc<dyn DispatchStrategy>>,
    default_strategy: RwLock<Option<Arc<dyn DispatchStrategy>>>,
    observers: RwLock<Arc<ObserverChain>>,
    registration: Mutex<()>,
}

impl EventBus {
    /// Bus with the default configuration: one background default strategy
    pub fn new() -> Self {
        Self::from_validated(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: BusConfig) -> Self {
        Self {
            config,
            handlers: DashMap::new(),
            holders: DashMap::new(),
            strategies: DashMap::new(),
            default_strategy: RwLock::new(None),
            observers: RwLock::new(Arc::new(ObserverChain::new())),
            registration: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Register `handler` for messages of type `M` under a fresh id
    ///
    /// Every call adds a registration. Use [`EventBus::subscribe_shared`] or
    /// [`EventBus::subscribe_with_id`] when repeating a call must not.
    pub fn subscribe<M, H>(&self, handler: H) -> HandlerId
    where
        M: Message,
        H: Handler<M>,
    {
        self.register(Arc::new(TypedHandler::new(HandlerId::new(), handler)), None)
    }

    /// Register a closure for messages of type `M`
    pub fn subscribe_fn<M, F>(&self, handler: F) -> HandlerId
    where
        M: Message,
        F: Fn(&M) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe::<M, F>(handler)
    }

    /// Register a shared handler; idempotent per allocation and message type
    ///
    /// Subscribing the same `Arc` again for `M` returns the existing id.
    pub fn subscribe_shared<M, H>(&self, handler: Arc<H>) -> HandlerId
    where
        M: Message,
        H: Handler<M>,
    {
        self.register(Arc::new(TypedHandler::shared(HandlerId::new(), handler)), None)
    }

    /// Register `handler` under a caller-chosen id
    ///
    /// Reusing an id for another message type makes both registrations one
    /// logical handler for [`EventBus::unsubscribe`]. Reusing it for the same
    /// type is a no-op and the first handler stays registered.
    pub fn subscribe_with_id<M, H>(&self, id: HandlerId, handler: H) -> HandlerId
    where
        M: Message,
        H: Handler<M>,
    {
        self.register(Arc::new(TypedHandler::new(id, handler)), None)
    }

    /// Register `handler` and record it under `holder` for
    /// [`EventBus::unsubscribe_all`]
    pub fn subscribe_with_holder<M, H>(&self, holder: HolderKey, handler: H) -> HandlerId
    where
        M: Message,
        H: Handler<M>,
    {
        self.register(
            Arc::new(TypedHandler::new(HandlerId::new(), handler)),
            Some(holder),
        )
    }

    fn register(&self, handler: Arc<dyn ErasedHandler>, holder: Option<HolderKey>) -> HandlerId {
        let info = handler.info().clone();
        let origin = handler.origin();
        let _registration = self.registration.lock();

        let id = {
            let mut set = self.handlers.entry(info.message_type).or_default();
            let existing = set
                .iter()
                .find(|existing| {
                    existing.info().id == info.id
                        || (origin.is_some() && existing.origin() == origin)
                })
                .map(|existing| existing.info().id);
            match existing {
                Some(id) => {
                    trace!(handler_id = %id, message_type = %info.message_type, "Handler already subscribed");
                    id
                }
                None => {
                    Arc::make_mut(set.value_mut()).push(handler);
                    debug!(
                        handler_id = %info.id,
                        handler = %info.name,
                        message_type = %info.message_type,
                        "Handler subscribed"
                    );
                    info.id
                }
            }
        };

        if let Some(holder) = holder {
            self.holders.entry(holder).or_default().insert(id);
        }
        id
    }

    /// Remove the handler from every message type it is registered under
    ///
    /// Returns `false` when nothing was registered under `id`.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let _registration = self.registration.lock();
        let removed = self.remove_handlers(|candidate| candidate == id);

        self.holders.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });

        if removed > 0 {
            debug!(handler_id = %id, registrations = removed, "Handler unsubscribed");
        }
        removed > 0
    }

    /// Remove every handler recorded under `holder`; returns how many
    /// registrations were dropped
    pub fn unsubscribe_all(&self, holder: HolderKey) -> usize {
        let _registration = self.registration.lock();
        let Some((_, ids)) = self.holders.remove(&holder) else {
            return 0;
        };

        let removed = self.remove_handlers(|candidate| ids.contains(&candidate));
        // Ids shared with other holders via subscribe_with_id are gone now too.
        self.holders.retain(|_, other| {
            other.retain(|id| !ids.contains(id));
            !other.is_empty()
        });

        debug!(holder = %holder, registrations = removed, "Holder unsubscribed");
        removed
    }

    /// Caller must hold the registration lock
    fn remove_handlers(&self, matches: impl Fn(HandlerId) -> bool) -> usize {
        let mut removed = 0;
        self.handlers.retain(|_, set| {
            let before = set.len();
            if set.iter().any(|handler| matches(handler.info().id)) {
                Arc::make_mut(set).retain(|handler| !matches(handler.info().id));
            }
            removed += before - set.len();
            !set.is_empty()
        });
        removed
    }

    /// Snapshot of the handlers registered for `M`
    pub fn list_handlers<M: Message>(&self) -> Vec<HandlerInfo> {
        self.handlers
            .get(&MessageType::of::<M>())
            .map(|set| set.iter().map(|handler| handler.info().clone()).collect())
            .unwrap_or_default()
    }

    /// Registrations across all message types
    pub fn handler_count(&self) -> usize {
        self.handlers.iter().map(|entry| entry.value().len()).sum()
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Hand `message` to every handler subscribed for its type
    ///
    /// Returns once each unit has been passed to the strategy; handler
    /// failures never surface here. Fails only when the resolved strategy has
    /// been shut down or a worker thread could not be started.
    pub fn publish<M: Message>(&self, message: M) -> BusResult<()> {
        self.publish_shared(Arc::new(message))
    }

    /// Publish an already shared message, routed by its runtime type
    pub fn publish_shared(&self, message: Arc<dyn Message>) -> BusResult<()> {
        let message_type = message.message_type();
        // The guard is released here; dispatch works on the snapshot.
        let handlers = self
            .handlers
            .get(&message_type)
            .map(|set| Arc::clone(set.value()));
        let observers = self.observer_chain();

        let handlers = match handlers {
            Some(handlers) if !handlers.is_empty() => handlers,
            _ => {
                trace!(message_type = %message_type, "No handler subscribed");
                let strategy = self.current_strategy_name(message_type);
                observers.event_ignored(message.as_ref(), &strategy, IgnoreReason::NoHandler);
                return Ok(());
            }
        };

        let strategy = self.resolve_strategy(message_type)?;
        let sink: Arc<dyn Observer> = observers.clone();
        for handler in handlers.iter() {
            observers.before_dispatch(message.as_ref(), handler.info(), strategy.name());
            strategy.dispatch(
                DispatchUnit::new(Arc::clone(&message), Arc::clone(handler)),
                Arc::clone(&sink),
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // Strategies
    // =========================================================================

    /// Route `M` through `strategy` from now on; returns the replaced override
    ///
    /// Units already handed to the previous strategy stay with it. The bus
    /// does not stop a replaced strategy.
    pub fn configure_strategy<M: Message>(
        &self,
        strategy: Arc<dyn DispatchStrategy>,
    ) -> Option<Arc<dyn DispatchStrategy>> {
        let message_type = MessageType::of::<M>();
        log_bus_operation(
            "configure_strategy",
            Some(message_type.short_name()),
            Some(strategy.name()),
            "installed",
            None,
        );
        self.strategies.insert(message_type, strategy)
    }

    /// Replace the strategy used by types without an override
    pub fn set_default_strategy(
        &self,
        strategy: Arc<dyn DispatchStrategy>,
    ) -> Option<Arc<dyn DispatchStrategy>> {
        log_bus_operation(
            "set_default_strategy",
            None,
            Some(strategy.name()),
            "installed",
            None,
        );
        self.default_strategy.write().replace(strategy)
    }

    /// Strategy messages of type `M` are routed through
    pub fn strategy_for<M: Message>(&self) -> BusResult<Arc<dyn DispatchStrategy>> {
        self.resolve_strategy(MessageType::of::<M>())
    }

    /// Override if present, else a configured per-type strategy (built on
    /// first use), else the default
    fn resolve_strategy(&self, message_type: MessageType) -> BusResult<Arc<dyn DispatchStrategy>> {
        if let Some(strategy) = self.strategies.get(&message_type) {
            return Ok(Arc::clone(strategy.value()));
        }

        let short_name = message_type.short_name();
        if let Some(configured) = self.config.strategy_for(short_name) {
            let strategy = match self.strategies.entry(message_type) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    let name = format!("{}-{short_name}", self.config.worker_name_prefix);
                    let strategy = configured.build(&name)?;
                    debug!(message_type = %message_type, strategy = %strategy.name(), "Configured strategy created");
                    entry.insert(Arc::clone(&strategy));
                    strategy
                }
            };
            return Ok(strategy);
        }

        self.default_strategy()
    }

    /// Name of the strategy `message_type` would route through, without
    /// creating one
    fn current_strategy_name(&self, message_type: MessageType) -> String {
        if let Some(strategy) = self.strategies.get(&message_type) {
            return strategy.name().to_string();
        }
        let prefix = &self.config.worker_name_prefix;
        let short_name = message_type.short_name();
        if self.config.strategy_for(short_name).is_some() {
            return format!("{prefix}-{short_name}");
        }
        match self.default_strategy.read().as_ref() {
            Some(strategy) => strategy.name().to_string(),
            None => format!("{prefix}-{DEFAULT_STRATEGY_NAME}"),
        }
    }

    fn default_strategy(&self) -> BusResult<Arc<dyn DispatchStrategy>> {
        if let Some(strategy) = self.default_strategy.read().as_ref() {
            return Ok(Arc::clone(strategy));
        }

        let mut slot = self.default_strategy.write();
        if let Some(strategy) = slot.as_ref() {
            return Ok(Arc::clone(strategy));
        }
        let name = format!("{}-{DEFAULT_STRATEGY_NAME}", self.config.worker_name_prefix);
        let strategy = self.config.default_strategy.build(&name)?;
        debug!(strategy = %strategy.name(), "Default strategy created");
        *slot = Some(Arc::clone(&strategy));
        Ok(strategy)
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Append an observer; it sees every callback from subsequent publishes
    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.read().add(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    fn observer_chain(&self) -> Arc<ObserverChain> {
        Arc::clone(&self.observers.read())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stop every strategy, then reset the bus
    ///
    /// Each strategy is asked to stop independently with the same `wait` and
    /// `timeout`. Observers keep receiving callbacks for work drained during
    /// shutdown; afterwards handlers, holders, overrides, the default
    /// strategy and observers are all cleared.
    pub fn shutdown(&self, wait: bool, timeout: Duration) -> ShutdownReport {
        let mut owned: Vec<Arc<dyn DispatchStrategy>> = Vec::new();
        if let Some(strategy) = self.default_strategy.read().as_ref() {
            owned.push(Arc::clone(strategy));
        }
        for entry in self.strategies.iter() {
            let strategy = entry.value();
            if !owned
                .iter()
                .any(|seen| std::ptr::addr_eq(Arc::as_ptr(seen), Arc::as_ptr(strategy)))
            {
                owned.push(Arc::clone(strategy));
            }
        }

        let mut report = ShutdownReport::default();
        for strategy in &owned {
            let outcome = strategy.shutdown(wait, timeout);
            log_bus_operation(
                "shutdown",
                None,
                Some(strategy.name()),
                &format!("{outcome:?}"),
                None,
            );
            report.push(strategy.name(), outcome);
        }

        let _registration = self.registration.lock();
        self.handlers.clear();
        self.holders.clear();
        self.strategies.clear();
        *self.default_strategy.write() = None;
        // Units still running on a timed-out or detached worker keep the old
        // chain; it is emptied so their late callbacks go nowhere.
        let retired = std::mem::replace(
            &mut *self.observers.write(),
            Arc::new(ObserverChain::new()),
        );
        retired.clear();

        debug!(
            strategies = report.strategies.len(),
            clean = report.is_clean(),
            "Event bus shut down"
        );
        report
    }

    /// [`EventBus::shutdown`] with the configured `wait` and timeout
    pub fn close(&self) -> ShutdownReport {
        let shutdown = self.config.shutdown;
        self.shutdown(shutdown.wait, shutdown.timeout())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("message_types", &self.handlers.len())
            .field("handlers", &self.handler_count())
            .field("holders", &self.holders.len())
            .field("overrides", &self.strategies.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}
