//! The per-bar decision loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sirocco_core::data::Bar;
use sirocco_core::error::RiskError;
use sirocco_core::types::{Symbol, Timestamp};
use sirocco_indicators::IndicatorEngine;
use sirocco_strategy::{Signal, SignalAction, StrategySpec};

use crate::decision::TradeDecision;
use crate::position::Position;
use crate::store::SpecStore;

fn default_max_latency_ms() -> u64 {
    1
}

/// Execution engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Decision latency above which a warning is logged, in milliseconds.
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_latency_ms: default_max_latency_ms(),
        }
    }
}

/// Daily P&L tracker keyed by UTC day.
#[derive(Debug, Default)]
struct DailyPnl {
    day: Option<i64>,
    fraction: f64,
}

impl DailyPnl {
    fn roll(&mut self, ts: Timestamp) {
        let day = ts.day_ordinal();
        if self.day != Some(day) {
            self.day = Some(day);
            self.fraction = 0.0;
        }
    }
}

/// The fast-path execution engine.
///
/// Stateless with respect to specs (loaded and unloaded through the
/// [`SpecStore`]); stateful with respect to bar history, positions, and
/// daily P&L. `on_bar` is synchronous, never raises, and never suspends.
///
/// Fills happen outside the engine (paper book or backtest); the fill layer
/// reports positions back via [`ExecutionEngine::set_position`] /
/// [`ExecutionEngine::clear_position`] and realized P&L via
/// [`ExecutionEngine::record_realized_pnl`] so the risk gates see them.
pub struct ExecutionEngine {
    specs: SpecStore,
    indicators: IndicatorEngine,
    positions: HashMap<Symbol, Position>,
    daily: DailyPnl,
    config: EngineConfig,
    bars_processed: u64,
    decisions_emitted: u64,
}

impl ExecutionEngine {
    /// Creates an engine with its own spec store.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(SpecStore::new(), config)
    }

    /// Creates an engine reading specs from an existing store.
    #[must_use]
    pub fn with_store(specs: SpecStore, config: EngineConfig) -> Self {
        Self {
            specs,
            indicators: IndicatorEngine::new(),
            positions: HashMap::new(),
            daily: DailyPnl::default(),
            config,
            bars_processed: 0,
            decisions_emitted: 0,
        }
    }

    /// Returns a handle to the spec store (for the orchestrator's writer).
    #[must_use]
    pub fn spec_store(&self) -> SpecStore {
        self.specs.clone()
    }

    /// Validates, compiles, and loads a spec, replacing any prior spec for
    /// the ticker.
    ///
    /// # Errors
    ///
    /// Returns the validation or compilation failure; nothing is loaded.
    pub fn load(&self, spec: StrategySpec) -> sirocco_core::error::Result<()> {
        self.specs.install(spec)
    }

    /// Unloads the spec for a ticker and destroys its indicator state and
    /// tracked position.
    pub fn unload(&mut self, ticker: &Symbol) {
        self.specs.remove(ticker);
        self.indicators.reset(ticker);
        self.positions.remove(ticker);
    }

    /// Processes one bar and returns a decision if a signal fires and clears
    /// the risk gates.
    ///
    /// Unknown ticker, expired spec, insufficient history, and invalid bars
    /// all return `None` silently (the latter with a logged warning).
    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeDecision> {
        let start = Instant::now();

        let loaded = self.specs.snapshot(&bar.ticker)?;
        if loaded.spec.is_expired(bar.timestamp) {
            debug!(ticker = %bar.ticker, spec_id = %loaded.spec.id, "spec expired, ignoring bar");
            return None;
        }

        self.bars_processed += 1;
        self.daily.roll(bar.timestamp);

        // A replaced spec keeps warm history unless its data requirements
        // changed; the indicator engine rebuilds on requirement changes.
        let requirements = &loaded.spec.data_requirements;
        let enriched = self
            .indicators
            .enrich(bar, &loaded.requested, requirements.lookback)
            .ok()?;

        if self.indicators.history_len(&bar.ticker) < requirements.min_data_points {
            return None;
        }

        for compiled in &loaded.signals {
            if compiled.is_disabled() {
                continue;
            }
            match compiled.predicate.evaluate(&enriched) {
                Ok(true) => {
                    compiled.record_success();
                    match self.check_risk_gates(&loaded.spec, &compiled.signal, &bar.ticker) {
                        Ok(()) => {
                            let decision = self.build_decision(
                                &loaded.spec,
                                &compiled.signal,
                                bar,
                                start,
                            );
                            self.decisions_emitted += 1;
                            return Some(decision);
                        }
                        Err(rejection) => {
                            debug!(
                                ticker = %bar.ticker,
                                signal = %compiled.signal.id,
                                %rejection,
                                "risk gate rejected signal"
                            );
                        }
                    }
                }
                Ok(false) => compiled.record_success(),
                Err(err) => {
                    if compiled.record_error() {
                        warn!(
                            ticker = %bar.ticker,
                            signal = %compiled.signal.id,
                            error = %err,
                            "signal disabled after repeated runtime errors"
                        );
                    }
                }
            }
        }

        None
    }

    fn check_risk_gates(
        &self,
        spec: &StrategySpec,
        signal: &Signal,
        ticker: &Symbol,
    ) -> Result<(), RiskError> {
        if signal.action == SignalAction::Hold {
            return Ok(());
        }
        let risk = &spec.risk_params;
        if signal.position_size > risk.max_position_size {
            return Err(RiskError::PositionSizeExceeded {
                requested: signal.position_size,
                max: risk.max_position_size,
            });
        }
        if self.daily.fraction < -risk.max_daily_loss {
            return Err(RiskError::DailyLossLimit {
                pnl_fraction: self.daily.fraction,
                limit: risk.max_daily_loss,
            });
        }
        // No pyramiding: a BUY is rejected while a position is open. SELL
        // stays emittable so the fill layer can close.
        if signal.action == SignalAction::Buy
            && self.positions.get(ticker).is_some_and(Position::is_open)
        {
            return Err(RiskError::PositionAlreadyOpen {
                ticker: ticker.to_string(),
            });
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn build_decision(
        &self,
        spec: &StrategySpec,
        signal: &Signal,
        bar: &Bar,
        start: Instant,
    ) -> TradeDecision {
        let risk = &spec.risk_params;
        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(self.config.max_latency_ms) {
            warn!(
                ticker = %bar.ticker,
                latency_ns = elapsed.as_nanos() as u64,
                budget_ms = self.config.max_latency_ms,
                "decision latency over budget"
            );
        }
        TradeDecision {
            action: signal.action,
            ticker: bar.ticker.clone(),
            position_size: signal.position_size,
            entry_price: bar.close,
            stop_loss: bar.close * (1.0 - risk.stop_loss),
            take_profit: bar.close * (1.0 + risk.take_profit),
            confidence: signal.confidence,
            reasoning: signal.reasoning.clone(),
            signal_id: signal.id.clone(),
            latency_ns: elapsed.as_nanos() as u64,
            timestamp: bar.timestamp,
        }
    }

    /// Returns the tracked position for a ticker.
    #[must_use]
    pub fn position(&self, ticker: &Symbol) -> Option<&Position> {
        self.positions.get(ticker)
    }

    /// Records a position opened by the fill layer.
    pub fn set_position(&mut self, position: Position) {
        self.positions.insert(position.ticker.clone(), position);
    }

    /// Clears the position for a ticker after the fill layer closes it.
    pub fn clear_position(&mut self, ticker: &Symbol) {
        self.positions.remove(ticker);
    }

    /// Records realized P&L as a fraction of capital, for the daily-loss
    /// gate. Rolls the daily window on UTC day change.
    pub fn record_realized_pnl(&mut self, ts: Timestamp, fraction: f64) {
        self.daily.roll(ts);
        self.daily.fraction += fraction;
    }

    /// Current daily P&L fraction.
    #[must_use]
    pub fn daily_pnl_fraction(&self) -> f64 {
        self.daily.fraction
    }

    /// Number of bars processed against a live spec.
    #[must_use]
    pub fn bars_processed(&self) -> u64 {
        self.bars_processed
    }

    /// Number of decisions emitted.
    #[must_use]
    pub fn decisions_emitted(&self) -> u64 {
        self.decisions_emitted
    }

    /// Bars currently held for a ticker.
    #[must_use]
    pub fn history_len(&self, ticker: &Symbol) -> usize {
        self.indicators.history_len(ticker)
    }
}
