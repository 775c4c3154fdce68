//! # Bus Configuration
//!
//! Configuration is layered with the `config` crate: an optional file (format
//! picked from its extension) overridden by `EVENTBUS__*` environment
//! variables. Every field has a default, so an empty source is a valid
//! configuration.
//!
//! ```toml
//! worker_name_prefix = "app-events"
//!
//! [default_strategy]
//! kind = "background"
//!
//! [strategies.BoardChanged]
//! kind = "debounce"
//! delay_ms = 250
//!
//! [shutdown]
//! wait = true
//! timeout_ms = 5000
//! ```
//!
//! Per-type entries are keyed by the message type's short name and are
//! installed the first time a message of that type is published.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    CONFIG_ENV_PREFIX, CONFIG_ENV_SEPARATOR, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_WORKER_NAME_PREFIX,
};
use crate::dispatch::{BackgroundStrategy, DebounceStrategy, DispatchStrategy};
use crate::error::{BusError, BusResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Strategy used for message types without an override
    pub default_strategy: StrategyConfig,

    /// Per-type overrides keyed by message short type name
    pub strategies: HashMap<String, StrategyConfig>,

    /// Defaults for `EventBus::close`
    pub shutdown: ShutdownConfig,

    /// Prefix for worker thread names
    pub worker_name_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyConfig::Background,
            strategies: HashMap::new(),
            shutdown: ShutdownConfig::default(),
            worker_name_prefix: DEFAULT_WORKER_NAME_PREFIX.to_string(),
        }
    }
}

/// Which built-in strategy to construct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    Background,
    Debounce {
        delay_ms: u64,
    },
}

impl StrategyConfig {
    /// Build the strategy; `name` becomes the worker thread name prefix
    pub fn build(&self, name: &str) -> BusResult<Arc<dyn DispatchStrategy>> {
        let strategy: Arc<dyn DispatchStrategy> = match self {
            StrategyConfig::Background => Arc::new(BackgroundStrategy::named(name)?),
            StrategyConfig::Debounce { delay_ms } => Arc::new(DebounceStrategy::named(
                name,
                Duration::from_millis(*delay_ms),
            )?),
        };
        Ok(strategy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub wait: bool,
    pub timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            wait: true,
            timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl BusConfig {
    /// Load from environment variables only
    pub fn from_env() -> BusResult<Self> {
        Self::load(None)
    }

    /// Load from an optional file, then apply `EVENTBUS__*` overrides
    pub fn load(path: Option<&Path>) -> BusResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(BusError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator(CONFIG_ENV_SEPARATOR)
                .separator(CONFIG_ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: BusConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            default_strategy = ?config.default_strategy,
            overrides = config.strategies.len(),
            shutdown_timeout_ms = config.shutdown.timeout_ms,
            "Bus configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.worker_name_prefix.trim().is_empty() {
            return Err(BusError::Configuration(
                "worker_name_prefix must not be empty".to_string(),
            ));
        }
        if let Some(name) = self.strategies.keys().find(|name| name.trim().is_empty()) {
            return Err(BusError::Configuration(format!(
                "strategy override key '{name}' must name a message type"
            )));
        }
        Ok(())
    }

    /// Override configured for a message type's short name
    ///
    /// Matching ignores ASCII case since environment keys arrive lowercased.
    pub fn strategy_for(&self, short_name: &str) -> Option<&StrategyConfig> {
        self.strategies.get(short_name).or_else(|| {
            self.strategies
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(short_name))
                .map(|(_, strategy)| strategy)
        })
    }
}
