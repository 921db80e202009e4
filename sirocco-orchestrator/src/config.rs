//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use sirocco_backtest::BacktestConfig;
use sirocco_engine::EngineConfig;

use crate::gates::StartGateConfig;

fn default_refresh_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_max_consecutive_losses() -> u32 {
    3
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How often the background task refreshes strategies.
    #[serde(with = "humantime_serde", default = "default_refresh_interval")]
    pub strategy_refresh_interval: Duration,
    /// Gate #1 thresholds.
    #[serde(default)]
    pub start_gate: StartGateConfig,
    /// Gate #2: consecutive losing round trips before dropping to research.
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    /// Backtest and paper-fill parameters.
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// Fast-path engine parameters.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy_refresh_interval: default_refresh_interval(),
            start_gate: StartGateConfig::default(),
            max_consecutive_losses: default_max_consecutive_losses(),
            backtest: BacktestConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}
