//! Shared constants for strategy naming, configuration and shutdown defaults.

use std::time::Duration;

/// Name given to the lazily created default strategy
pub const DEFAULT_STRATEGY_NAME: &str = "default";

/// Prefix for worker thread names when the configuration does not override it
pub const DEFAULT_WORKER_NAME_PREFIX: &str = "eventbus";

/// Environment variable prefix used by the configuration loader
pub const CONFIG_ENV_PREFIX: &str = "EVENTBUS";

/// Separator for nested keys in environment variables (`EVENTBUS__SHUTDOWN__WAIT`)
pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Default shutdown timeout used by [`EventBus::close`](crate::EventBus::close)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Reason strings reported through `Observer::event_ignored`
pub mod ignore_reasons {
    pub const NO_HANDLER: &str = "no handler";
    pub const TOO_MANY_CALLS: &str = "too many calls";
}
