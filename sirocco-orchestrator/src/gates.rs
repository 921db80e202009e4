//! Gate #1: start-trading thresholds over backtest metrics.

use serde::{Deserialize, Serialize};

use sirocco_backtest::BacktestReport;

fn default_min_trades() -> u64 {
    3
}

fn default_max_drawdown_pct() -> f64 {
    20.0
}

fn default_min_return_pct() -> f64 {
    -5.0
}

/// Thresholds a backtest must clear before live paper trading starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartGateConfig {
    /// Minimum completed round trips.
    #[serde(default = "default_min_trades")]
    pub min_trades: u64,
    /// Maximum tolerated drawdown percentage.
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,
    /// Minimum total return percentage.
    #[serde(default = "default_min_return_pct")]
    pub min_return_pct: f64,
}

impl Default for StartGateConfig {
    fn default() -> Self {
        Self {
            min_trades: default_min_trades(),
            max_drawdown_pct: default_max_drawdown_pct(),
            min_return_pct: default_min_return_pct(),
        }
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Whether every check cleared.
    pub passed: bool,
    /// Failed checks, human-readable.
    pub failures: Vec<String>,
}

/// Evaluates gate #1 against a backtest report.
///
/// All three checks always run so the failure list is complete.
#[must_use]
pub fn evaluate_start_gate(config: &StartGateConfig, report: &BacktestReport) -> GateReport {
    let mut failures = Vec::new();
    if report.total_trades < config.min_trades {
        failures.push(format!(
            "trades {} < required {}",
            report.total_trades, config.min_trades
        ));
    }
    if report.max_drawdown_pct > config.max_drawdown_pct {
        failures.push(format!(
            "drawdown {:.2}% > allowed {:.2}%",
            report.max_drawdown_pct, config.max_drawdown_pct
        ));
    }
    if report.total_return_pct < config.min_return_pct {
        failures.push(format!(
            "return {:.2}% < required {:.2}%",
            report.total_return_pct, config.min_return_pct
        ));
    }
    GateReport {
        passed: failures.is_empty(),
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirocco_core::types::{Symbol, Timestamp};

    fn report(total_trades: u64, return_pct: f64, drawdown_pct: f64) -> BacktestReport {
        let initial = 100_000.0;
        let final_capital = initial * (1.0 + return_pct / 100.0);
        let mut report = BacktestReport::from_run(
            Symbol::new("AAPL").unwrap(),
            initial,
            final_capital,
            vec![],
            vec![(Timestamp::new_unchecked(0), initial)],
        );
        report.total_trades = total_trades;
        report.max_drawdown_pct = drawdown_pct;
        report
    }

    #[test]
    fn test_gate_passes_when_all_clear() {
        let config = StartGateConfig {
            min_trades: 3,
            max_drawdown_pct: 20.0,
            min_return_pct: -5.0,
        };
        let gate = evaluate_start_gate(&config, &report(5, 12.0, 8.0));
        assert!(gate.passed);
        assert!(gate.failures.is_empty());
    }

    #[test]
    fn test_gate_fails_on_too_few_trades() {
        // Spec scenario 3: trades=2, return=3%, dd=5% against 3/20/-5.
        let config = StartGateConfig {
            min_trades: 3,
            max_drawdown_pct: 20.0,
            min_return_pct: -5.0,
        };
        let gate = evaluate_start_gate(&config, &report(2, 3.0, 5.0));
        assert!(!gate.passed);
        assert_eq!(gate.failures.len(), 1);
        assert!(gate.failures[0].contains("trades 2"));
    }

    #[test]
    fn test_gate_collects_all_failures() {
        let config = StartGateConfig::default();
        let gate = evaluate_start_gate(&config, &report(0, -30.0, 45.0));
        assert!(!gate.passed);
        assert_eq!(gate.failures.len(), 3);
    }

    #[test]
    fn test_gate_boundaries_are_inclusive() {
        let config = StartGateConfig {
            min_trades: 3,
            max_drawdown_pct: 20.0,
            min_return_pct: -5.0,
        };
        let gate = evaluate_start_gate(&config, &report(3, -5.0, 20.0));
        assert!(gate.passed);
    }
}
