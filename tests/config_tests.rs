mod common;

use std::io::Write;
use std::time::Duration;

use common::*;
use eventbus_core::{BusConfig, BusError, EventBus, IgnoreReason, StrategyConfig};

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("eventbus")
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_configured_debounce_is_installed_on_first_publish() {
    let file = config_file(
        r#"
worker_name_prefix = "ui"

[strategies.BoardChanged]
kind = "debounce"
delay_ms = 300
"#,
    );
    let config = BusConfig::load(Some(file.path())).unwrap();
    let bus = EventBus::with_config(config).unwrap();
    let observer = RecordingObserver::new();
    bus.add_observer(observer.clone());
    let (count, counter) = counting_handler::<BoardChanged>();
    bus.subscribe_fn::<BoardChanged, _>(counter);

    for revision in 0..5 {
        bus.publish(BoardChanged::new(revision)).unwrap();
    }
    let strategy = bus.strategy_for::<BoardChanged>().unwrap();
    assert!(strategy.name().starts_with("ui-BoardChanged-"));
    assert!(bus
        .strategy_for::<UserChanged>()
        .unwrap()
        .name()
        .starts_with("ui-default-"));

    assert!(bus.close().is_clean());
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(observer.ignored(IgnoreReason::TooManyCalls), 4);
}

#[test]
fn test_debounce_as_default_strategy() {
    let config = BusConfig {
        default_strategy: StrategyConfig::Debounce { delay_ms: 300 },
        ..BusConfig::default()
    };
    let bus = EventBus::with_config(config).unwrap();
    let (users, user_counter) = counting_handler::<UserChanged>();
    bus.subscribe_fn::<UserChanged, _>(user_counter);

    for user_id in 0..3 {
        bus.publish(UserChanged { user_id }).unwrap();
    }
    bus.shutdown(true, Duration::from_secs(5));

    assert_eq!(users.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_close_uses_configured_shutdown() {
    let config = BusConfig {
        shutdown: eventbus_core::ShutdownConfig {
            wait: false,
            timeout_ms: 0,
        },
        ..BusConfig::default()
    };
    let bus = EventBus::with_config(config).unwrap();
    bus.subscribe_fn(|_: &BoardChanged| Ok(()));
    bus.publish(BoardChanged::new(1)).unwrap();

    let report = bus.close();
    assert_eq!(report.strategies.len(), 1);
    assert_eq!(
        report.strategies[0].outcome,
        eventbus_core::ShutdownOutcome::Detached
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = BusConfig {
        worker_name_prefix: String::new(),
        ..BusConfig::default()
    };
    assert!(matches!(
        EventBus::with_config(config),
        Err(BusError::Configuration(_))
    ));

    let file = config_file("[default_strategy]\nkind = \"round_robin\"\n");
    assert!(matches!(
        BusConfig::load(Some(file.path())),
        Err(BusError::Configuration(_))
    ));
}
