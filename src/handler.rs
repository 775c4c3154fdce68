//! # Handlers
//!
//! A [`Handler`] consumes exactly one message type. Closures of shape
//! `Fn(&M) -> HandlerResult` are handlers too, so most call sites never name the
//! trait. Each registration is identified by a [`HandlerId`]; grouping for bulk
//! removal uses a [`HolderKey`].
//!
//! The registry stores handlers type-erased behind `ErasedHandler`, which is
//! also where failures are turned into [`HandlerError`] values: returned
//! errors and panics are both caught here so they never unwind into a worker
//! or a publisher.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HandlerError;
use crate::message::{Message, MessageType};

/// Outcome of a single handler invocation
pub type HandlerResult = anyhow::Result<()>;

/// Capability that consumes messages of type `M`
pub trait Handler<M: Message>: Send + Sync + 'static {
    fn handle(&self, message: &M) -> HandlerResult;

    /// Display name used in observer callbacks and logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<M, F> Handler<M> for F
where
    M: Message,
    F: Fn(&M) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, message: &M) -> HandlerResult {
        self(message)
    }
}

/// Handler shared behind an `Arc`; registrations of the same allocation for
/// one message type collapse into one
pub(crate) struct SharedHandler<H>(pub(crate) Arc<H>);

impl<M, H> Handler<M> for SharedHandler<H>
where
    M: Message,
    H: Handler<M>,
{
    fn handle(&self, message: &M) -> HandlerResult {
        self.0.handle(message)
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

/// Identity of a registered handler
///
/// A fresh id is minted for every plain `subscribe` call. Passing the same id
/// to `subscribe_with_id` under several message types registers one logical
/// handler for all of them, and a single `unsubscribe(id)` removes it
/// everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", &self.0.simple().to_string()[..8])
    }
}

/// Identity under which a component groups its handlers for bulk removal
///
/// Keys compare by identity: two keys are equal only if one was cloned from
/// the other. A component typically creates one key and keeps it as a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderKey(Uuid);

impl HolderKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HolderKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "holder-{}", &self.0.simple().to_string()[..8])
    }
}

/// Descriptor of a registered handler, handed to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    pub id: HandlerId,
    pub name: String,
    pub message_type: MessageType,
}

/// Type-erased handler as stored by the registry
pub(crate) trait ErasedHandler: Send + Sync {
    fn info(&self) -> &HandlerInfo;

    /// Address of the shared allocation this registration wraps, if any
    fn origin(&self) -> Option<usize>;

    /// Run the handler, converting errors and panics into [`HandlerError`]
    fn invoke(&self, message: &dyn Message) -> Result<(), HandlerError>;
}

pub(crate) struct TypedHandler<M, H> {
    info: HandlerInfo,
    handler: H,
    origin: Option<usize>,
    _message: PhantomData<fn(&M)>,
}

impl<M, H> TypedHandler<M, H>
where
    M: Message,
    H: Handler<M>,
{
    pub(crate) fn new(id: HandlerId, handler: H) -> Self {
        let info = HandlerInfo {
            id,
            name: handler.name().to_string(),
            message_type: MessageType::of::<M>(),
        };
        Self {
            info,
            handler,
            origin: None,
            _message: PhantomData,
        }
    }
}

impl<M, H> TypedHandler<M, SharedHandler<H>>
where
    M: Message,
    H: Handler<M>,
{
    pub(crate) fn shared(id: HandlerId, handler: Arc<H>) -> Self {
        let origin = Arc::as_ptr(&handler) as *const () as usize;
        let mut typed = Self::new(id, SharedHandler(handler));
        typed.origin = Some(origin);
        typed
    }
}

impl<M, H> ErasedHandler for TypedHandler<M, H>
where
    M: Message,
    H: Handler<M>,
{
    fn info(&self) -> &HandlerInfo {
        &self.info
    }

    fn origin(&self) -> Option<usize> {
        self.origin
    }

    fn invoke(&self, message: &dyn Message) -> Result<(), HandlerError> {
        let typed = message
            .downcast_ref::<M>()
            .ok_or_else(|| HandlerError::TypeMismatch {
                handler: self.info.name.clone(),
                expected: self.info.message_type.name(),
                actual: message.type_name(),
            })?;

        match catch_unwind(AssertUnwindSafe(|| self.handler.handle(typed))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(HandlerError::Failed {
                handler: self.info.name.clone(),
                source,
            }),
            Err(payload) => Err(HandlerError::Panicked {
                handler: self.info.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
