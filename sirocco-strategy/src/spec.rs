//! The declarative strategy artifact.
//!
//! A `StrategySpec` is pure data plus one condition expression per signal.
//! There is no strategy subclass hierarchy: the execution engine is
//! monomorphic, and the only polymorphism in the system is the predicate the
//! condition compiler produces.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use sirocco_core::error::SpecError;
use sirocco_core::types::{Symbol, Timeframe, Timestamp};
use sirocco_indicators::IndicatorKind;

use crate::condition::CompiledCondition;

/// Trading action a signal requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    /// Open a long position.
    Buy,
    /// Close the long position.
    Sell,
    /// Do nothing (observability-only signal).
    Hold,
}

impl SignalAction {
    /// Returns the action as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One guarded trading signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Identifier, unique within the spec.
    pub id: String,
    /// Condition expression (see the `condition` module grammar).
    pub condition: String,
    /// Action to take when the condition holds.
    pub action: SignalAction,
    /// Fraction of capital to commit, in `[0, 1]`.
    pub position_size: f64,
    /// Producer confidence, in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable rationale; opaque to the engine.
    pub reasoning: String,
    /// Evaluation priority; higher fires first.
    pub priority: i32,
}

/// Risk constraints, all fractions of entry price or capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Largest allowed per-signal position size.
    pub max_position_size: f64,
    /// Stop-loss distance below entry.
    pub stop_loss: f64,
    /// Take-profit distance above entry.
    pub take_profit: f64,
    /// Daily loss fraction that halts trading.
    pub max_daily_loss: f64,
    /// Maximum tolerated drawdown fraction.
    pub max_drawdown: f64,
    /// Whether sizing may scale with confidence (reserved).
    pub use_dynamic_sizing: bool,
    /// Capital fraction risked per trade, in `[0, 0.1]`.
    pub risk_per_trade: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            max_position_size: 0.2,
            stop_loss: 0.05,
            take_profit: 0.10,
            max_daily_loss: 0.03,
            max_drawdown: 0.15,
            use_dynamic_sizing: false,
            risk_per_trade: 0.01,
        }
    }
}

/// What history and indicators the spec needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequirements {
    /// Symbolic indicator names (e.g., `"sma_20"`, `"rsi"`, `"macd"`).
    pub indicators: Vec<String>,
    /// Bars of history to retain (the ring holds `lookback * 2`).
    pub lookback: usize,
    /// Bars required before any decision is emitted.
    pub min_data_points: usize,
}

impl DataRequirements {
    /// Parses the symbolic indicator names into their validated form.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::UnknownIndicator` on an unrecognized name.
    pub fn parsed_indicators(&self) -> Result<Vec<IndicatorKind>, SpecError> {
        let mut kinds = Vec::with_capacity(self.indicators.len());
        for name in &self.indicators {
            kinds.push(IndicatorKind::parse(name)?);
        }
        kinds.sort_unstable();
        kinds.dedup();
        Ok(kinds)
    }
}

/// The compiled strategy artifact produced by the slow path and consumed by
/// the fast path.
///
/// Lifecycle: *compiled* → *expired* (once bar time passes `expires_at`) →
/// *unloaded*. The orchestrator exclusively owns live specs; the execution
/// engine holds a per-ticker reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    /// Spec identifier.
    pub id: String,
    /// Ticker the spec trades.
    pub ticker: Symbol,
    /// Bar timeframe the spec expects.
    pub timeframe: Timeframe,
    /// History and indicator requirements.
    pub data_requirements: DataRequirements,
    /// Signals, evaluated in descending priority order.
    pub signals: Vec<Signal>,
    /// Risk constraints.
    pub risk_params: RiskParameters,
    /// When the spec was compiled.
    pub compiled_at: Timestamp,
    /// When the spec stops producing decisions.
    pub expires_at: Timestamp,
    /// The natural-language query the spec was compiled from.
    pub source_query: String,
}

impl StrategySpec {
    /// Validates every spec invariant.
    ///
    /// Checks signal presence and id uniqueness, fractional ranges, indicator
    /// names and their enriched-field slots, lookback coverage, warmup
    /// coverage, and that every condition compiles.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a `SpecError`.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.signals.is_empty() {
            return Err(SpecError::EmptySignals);
        }

        let mut seen = HashSet::new();
        for signal in &self.signals {
            if !seen.insert(signal.id.as_str()) {
                return Err(SpecError::DuplicateSignalId(signal.id.clone()));
            }
            check_fraction("signal.position_size", signal.position_size, 0.0, 1.0)?;
            check_fraction("signal.confidence", signal.confidence, 0.0, 1.0)?;
            CompiledCondition::compile(&signal.condition).map_err(|source| {
                SpecError::Condition {
                    signal_id: signal.id.clone(),
                    source,
                }
            })?;
        }

        let risk = &self.risk_params;
        check_fraction("risk.max_position_size", risk.max_position_size, 0.0, 1.0)?;
        check_fraction("risk.stop_loss", risk.stop_loss, 0.0, 1.0)?;
        check_fraction("risk.take_profit", risk.take_profit, 0.0, 1.0)?;
        check_fraction("risk.max_daily_loss", risk.max_daily_loss, 0.0, 1.0)?;
        check_fraction("risk.max_drawdown", risk.max_drawdown, 0.0, 1.0)?;
        check_fraction("risk.risk_per_trade", risk.risk_per_trade, 0.0, 0.1)?;

        let requirements = &self.data_requirements;
        if requirements.lookback == 0 {
            return Err(SpecError::Invalid {
                reason: "lookback must be positive".to_string(),
            });
        }
        if requirements.min_data_points == 0 {
            return Err(SpecError::Invalid {
                reason: "min_data_points must be positive".to_string(),
            });
        }

        let kinds = requirements.parsed_indicators()?;
        for kind in &kinds {
            if !has_enriched_slot(*kind) {
                return Err(SpecError::Invalid {
                    reason: format!("indicator {kind} has no enriched-bar field"),
                });
            }
        }

        let max_period = kinds.iter().map(IndicatorKind::period).max().unwrap_or(0);
        if requirements.lookback < max_period {
            return Err(SpecError::LookbackTooShort {
                lookback: requirements.lookback,
                required: max_period,
            });
        }
        let warmup = max_period + usize::from(kinds.iter().any(IndicatorKind::requires_delta));
        if requirements.min_data_points < warmup {
            return Err(SpecError::MinDataPointsTooSmall {
                min_data_points: requirements.min_data_points,
                required: warmup,
            });
        }

        Ok(())
    }

    /// Returns true if the spec has expired as of the given time.
    ///
    /// Expiry is judged against bar timestamps so historical replays are
    /// deterministic.
    #[must_use]
    pub fn is_expired(&self, at: Timestamp) -> bool {
        at > self.expires_at
    }

    /// Returns true if the spec carries at least one BUY signal.
    #[must_use]
    pub fn has_buy_signal(&self) -> bool {
        self.signals
            .iter()
            .any(|s| s.action == SignalAction::Buy)
    }
}

fn check_fraction(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), SpecError> {
    if !value.is_finite() || value < min || value > max {
        return Err(SpecError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Indicators whose values can actually surface on an enriched bar.
///
/// SMA and EMA have fixed slots; the remaining indicators surface at any
/// period through their single field.
fn has_enriched_slot(kind: IndicatorKind) -> bool {
    match kind {
        IndicatorKind::Sma(p) => matches!(p, 20 | 50 | 200),
        IndicatorKind::Ema(p) => matches!(p, 12 | 26),
        IndicatorKind::Rsi(_)
        | IndicatorKind::Macd
        | IndicatorKind::Bollinger(_)
        | IndicatorKind::Atr(_)
        | IndicatorKind::Volume(_) => true,
    }
}
