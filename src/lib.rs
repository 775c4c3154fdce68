#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # EventBus Core
//!
//! In-process publish/subscribe dispatch core with pluggable dispatch
//! strategies.
//!
//! ## Overview
//!
//! Producers publish typed messages, consumers subscribe typed handlers, and a
//! [`DispatchStrategy`] decides on which thread, when, and whether each handler
//! runs. Every step of a dispatch is reported to registered [`Observer`]s.
//!
//! ## Architecture
//!
//! ```text
//! publish(msg) ──→ EventBus ──→ handler snapshot for typeof(msg)
//!                     │
//!                     ├─ observers.before_dispatch   (publisher thread)
//!                     └─ strategy.dispatch(unit) ──→ worker thread
//!                                                     ├─ before_run
//!                                                     ├─ handler
//!                                                     ├─ on_error (if failed)
//!                                                     └─ after_run
//! ```
//!
//! ## Module Organization
//!
//! - [`message`] - Message marker trait and type identity
//! - [`handler`] - Handler trait, handler and holder identities
//! - [`dispatch`] - Background and debounce strategies
//! - [`events`] - Observer trait, fan-out chain, tracing and stats observers
//! - [`registry`] - The [`EventBus`] and shutdown reporting
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use eventbus_core::{DebounceStrategy, EventBus, Message, TracingObserver};
//!
//! #[derive(Debug)]
//! struct BoardChanged {
//!     board: String,
//! }
//! impl Message for BoardChanged {}
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = EventBus::new();
//! bus.add_observer(Arc::new(TracingObserver::new()));
//!
//! bus.subscribe_fn(|event: &BoardChanged| {
//!     println!("redraw {}", event.board);
//!     Ok(())
//! });
//!
//! // Coalesce bursts of board updates into one redraw per 100ms.
//! bus.configure_strategy::<BoardChanged>(Arc::new(DebounceStrategy::new(
//!     Duration::from_millis(100),
//! )?));
//!
//! bus.publish(BoardChanged { board: "main".to_string() })?;
//!
//! let report = bus.shutdown(true, Duration::from_secs(5));
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                           # Unit tests
//! cargo test                                 # All tests
//! cargo bench --features benchmarks          # Dispatch throughput
//! ```

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod message;
pub mod registry;

pub use config::{BusConfig, ShutdownConfig, StrategyConfig};
pub use dispatch::{
    BackgroundStrategy, DebounceStrategy, DispatchStrategy, DispatchUnit, ShutdownOutcome,
};
pub use error::{BusError, BusResult, HandlerError};
pub use events::{
    DispatchStatsSnapshot, IgnoreReason, Observer, ObserverChain, StatsObserver, TracingObserver,
};
pub use handler::{Handler, HandlerId, HandlerInfo, HandlerResult, HolderKey};
pub use message::{Message, MessageType};
pub use registry::{EventBus, ShutdownReport, StrategyShutdown};
