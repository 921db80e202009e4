//! Backtest configuration.

use serde::{Deserialize, Serialize};

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_commission_rate() -> f64 {
    0.001
}

fn default_slippage() -> f64 {
    0.0005
}

fn default_equity_sample_interval() -> usize {
    100
}

/// Configuration for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash.
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Commission as a fraction of notional, charged per fill.
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    /// Slippage as a fraction of price, adverse on both sides.
    #[serde(default = "default_slippage")]
    pub slippage: f64,
    /// Sample the equity curve every this many bars (and at end of run).
    #[serde(default = "default_equity_sample_interval")]
    pub equity_sample_interval: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            commission_rate: default_commission_rate(),
            slippage: default_slippage(),
            equity_sample_interval: default_equity_sample_interval(),
        }
    }
}
