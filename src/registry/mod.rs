//! # Registry
//!
//! The [`EventBus`] owns every piece of shared dispatch state:
//!
//! ```text
//! EventBus
//! ├── handlers     MessageType -> [handler]      (copy-on-write snapshots)
//! ├── holders      HolderKey   -> {HandlerId}    (bulk removal only)
//! ├── strategies   MessageType -> DispatchStrategy
//! ├── default      DispatchStrategy              (created on first use)
//! └── observers    ObserverChain
//! ```
//!
//! [`ShutdownReport`] summarizes what happened to each strategy when the bus
//! was shut down.

pub mod event_bus;
pub mod shutdown;

pub use event_bus::EventBus;
pub use shutdown::{ShutdownReport, StrategyShutdown};
