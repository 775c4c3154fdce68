//! Bus-level shutdown summary.

use serde::{Deserialize, Serialize};

use crate::dispatch::ShutdownOutcome;
use crate::error::{BusError, BusResult};

/// Outcome for one strategy stopped during [`EventBus::shutdown`](crate::EventBus::shutdown)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyShutdown {
    pub strategy: String,
    #[serde(flatten)]
    pub outcome: ShutdownOutcome,
}

/// What happened to every strategy the bus owned when it was shut down
///
/// A timeout is not an error by itself: the worker was force-stopped and the
/// bus has already been reset. Call [`ShutdownReport::into_result`] to treat
/// it as one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub strategies: Vec<StrategyShutdown>,
}

impl ShutdownReport {
    pub(crate) fn push(&mut self, strategy: impl Into<String>, outcome: ShutdownOutcome) {
        self.strategies.push(StrategyShutdown {
            strategy: strategy.into(),
            outcome,
        });
    }

    /// No strategy hit its timeout
    pub fn is_clean(&self) -> bool {
        !self.strategies.iter().any(|entry| entry.outcome.is_timeout())
    }

    /// Names of the strategies that were force-stopped
    pub fn timed_out(&self) -> Vec<&str> {
        self.strategies
            .iter()
            .filter(|entry| entry.outcome.is_timeout())
            .map(|entry| entry.strategy.as_str())
            .collect()
    }

    /// Queued units discarded across all force-stopped strategies
    pub fn abandoned(&self) -> usize {
        self.strategies
            .iter()
            .map(|entry| match entry.outcome {
                ShutdownOutcome::TimedOut { abandoned } => abandoned,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, strategy: &str) -> Option<ShutdownOutcome> {
        self.strategies
            .iter()
            .find(|entry| entry.strategy == strategy)
            .map(|entry| entry.outcome)
    }

    pub fn into_result(self) -> BusResult<Self> {
        if self.is_clean() {
            return Ok(self);
        }
        Err(BusError::ShutdownTimeout {
            strategies: self.timed_out().into_iter().map(str::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report() {
        let mut report = ShutdownReport::default();
        report.push("eventbus-default-1", ShutdownOutcome::Drained);
        report.push("BoardChanged-2", ShutdownOutcome::Detached);

        assert!(report.is_clean());
        assert_eq!(report.abandoned(), 0);
        assert_eq!(
            report.outcome_for("BoardChanged-2"),
            Some(ShutdownOutcome::Detached)
        );
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_timeout_becomes_error_on_demand() {
        let mut report = ShutdownReport::default();
        report.push("fast-1", ShutdownOutcome::Drained);
        report.push("slow-2", ShutdownOutcome::TimedOut { abandoned: 4 });

        assert!(!report.is_clean());
        assert_eq!(report.timed_out(), vec!["slow-2"]);
        assert_eq!(report.abandoned(), 4);

        match report.into_result() {
            Err(BusError::ShutdownTimeout { strategies }) => {
                assert_eq!(strategies, vec!["slow-2".to_string()])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_report_serializes_flat() {
        let mut report = ShutdownReport::default();
        report.push("slow-2", ShutdownOutcome::TimedOut { abandoned: 1 });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategies"][0]["strategy"], "slow-2");
        assert_eq!(json["strategies"][0]["outcome"], "timed_out");
        assert_eq!(json["strategies"][0]["abandoned"], 1);
    }
}
