//! Error types for the event bus.
//!
//! Two families exist. [`BusError`] covers structural misuse and setup problems
//! that are returned to the caller. [`HandlerError`] covers failures inside a
//! handler; those never reach the publisher and are only delivered to observers
//! through [`Observer::on_error`](crate::events::Observer::on_error).

use thiserror::Error;

/// Caller-visible failures of bus and strategy operations
#[derive(Debug, Error)]
pub enum BusError {
    /// Work was handed to a strategy that has already been shut down
    #[error("Dispatch strategy '{strategy}' has been shut down")]
    StrategyStopped { strategy: String },

    /// The dedicated worker thread of a strategy could not be started
    #[error("Failed to spawn worker '{worker}': {source}")]
    WorkerSpawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more strategies did not drain before the shutdown timeout
    #[error("Shutdown timed out for strategies: {strategies:?}")]
    ShutdownTimeout { strategies: Vec<String> },
}

impl From<config::ConfigError> for BusError {
    fn from(error: config::ConfigError) -> Self {
        BusError::Configuration(error.to_string())
    }
}

pub type BusResult<T> = Result<T, BusError>;

/// Failure raised while a strategy runs a handler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error
    #[error("Handler '{handler}' failed: {source}")]
    Failed {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    /// The handler panicked; the panic was caught at the strategy boundary
    #[error("Handler '{handler}' panicked: {message}")]
    Panicked { handler: String, message: String },

    /// The handler was given a message of a type it was not registered for
    #[error("Handler '{handler}' expects {expected} but received {actual}")]
    TypeMismatch {
        handler: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl HandlerError {
    /// Name of the handler that produced this error
    pub fn handler(&self) -> &str {
        match self {
            HandlerError::Failed { handler, .. }
            | HandlerError::Panicked { handler, .. }
            | HandlerError::TypeMismatch { handler, .. } => handler,
        }
    }

    /// Whether the failure was a caught panic rather than a returned error
    pub fn is_panic(&self) -> bool {
        matches!(self, HandlerError::Panicked { .. })
    }
}
