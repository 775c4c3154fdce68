//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup for applications embedding the bus. The
//! core only emits events; nothing is printed until a subscriber is installed,
//! either by the host application or through [`init_structured_logging`].

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format of the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once and safe to call when the host already
/// installed a global subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let format = get_log_format();

        let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        let layer = match format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - keeping it");
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            log_level = %log_level,
            format = ?format,
            "Structured logging initialized"
        );
    });
}

/// Current environment from `EVENTBUS_ENV`, then `APP_ENV`
fn get_environment() -> String {
    std::env::var("EVENTBUS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// `EVENTBUS_LOG` wins; otherwise the environment decides
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("EVENTBUS_LOG") {
        return level;
    }
    default_log_level(environment).to_string()
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "test" => "debug",
        "development" => "debug",
        "production" => "info",
        _ => "debug",
    }
}

fn get_log_format() -> LogFormat {
    parse_log_format(std::env::var("EVENTBUS_LOG_FORMAT").ok().as_deref())
}

fn parse_log_format(value: Option<&str>) -> LogFormat {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

/// Log structured data for bus lifecycle operations
pub fn log_bus_operation(
    operation: &str,
    message_type: Option<&str>,
    strategy: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        message_type = message_type,
        strategy = strategy,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "BUS_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("EVENTBUS_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("EVENTBUS_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(default_log_level("test"), "debug");
        assert_eq!(default_log_level("development"), "debug");
        assert_eq!(default_log_level("production"), "info");
        assert_eq!(default_log_level("unknown"), "debug");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(parse_log_format(Some("JSON")), LogFormat::Json);
        assert_eq!(parse_log_format(Some("pretty")), LogFormat::Pretty);
        assert_eq!(parse_log_format(None), LogFormat::Pretty);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_bus_operation("test", Some("Ping"), None, "ok", None);
    }
}
