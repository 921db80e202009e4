//! Post-hoc analysis of zero-trade backtests.

use serde::{Deserialize, Serialize};
use std::fmt;

use sirocco_strategy::condition::CompiledCondition;
use sirocco_strategy::StrategySpec;

/// How many conjunctive terms mark a condition as over-restrictive.
const RESTRICTIVE_TERMS: usize = 3;
/// How many distinct indicators mark a condition as over-restrictive.
const RESTRICTIVE_INDICATORS: usize = 4;

/// Why a backtest produced no trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisKind {
    /// Too few bars to warm up and trade.
    InsufficientHistory,
    /// The spec has no BUY-action signals at all.
    NoBuySignals,
    /// A condition combines too many clauses or indicators to ever hold.
    OverRestrictiveConditions,
    /// The lookback eats most of the available history.
    LookbackTooLong,
    /// Nothing structurally wrong; the conditions simply never held.
    Untriggered,
}

impl fmt::Display for DiagnosisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InsufficientHistory => "insufficient history",
            Self::NoBuySignals => "no BUY signals",
            Self::OverRestrictiveConditions => "over-restrictive conditions",
            Self::LookbackTooLong => "lookback too long",
            Self::Untriggered => "untriggered",
        };
        write!(f, "{name}")
    }
}

/// Structured diagnosis of a zero-trade backtest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroTradeDiagnosis {
    /// Primary cause.
    pub kind: DiagnosisKind,
    /// Human-readable detail.
    pub detail: String,
    /// Actionable follow-ups, most promising first.
    pub suggestions: Vec<String>,
}

/// Diagnoses a backtest that completed with zero trades.
///
/// Checks run in order of likelihood to be the root cause; the first match
/// wins.
#[must_use]
pub fn diagnose_zero_trades(spec: &StrategySpec, bars_count: usize) -> ZeroTradeDiagnosis {
    if bars_count < 100 {
        return ZeroTradeDiagnosis {
            kind: DiagnosisKind::InsufficientHistory,
            detail: format!("only {bars_count} bars were replayed"),
            suggestions: vec![
                "fetch a longer history range".to_string(),
                "use a coarser timeframe to cover more calendar time".to_string(),
            ],
        };
    }

    if !spec.has_buy_signal() {
        return ZeroTradeDiagnosis {
            kind: DiagnosisKind::NoBuySignals,
            detail: "the spec carries no BUY-action signals".to_string(),
            suggestions: vec!["add at least one BUY signal to the spec".to_string()],
        };
    }

    for signal in &spec.signals {
        // Conditions were compiled at load; a failure here means the spec
        // never loaded, so skip silently.
        let Ok(compiled) = CompiledCondition::compile(&signal.condition) else {
            continue;
        };
        let terms = compiled.conjunctive_terms();
        let indicators = compiled
            .fields()
            .iter()
            .filter(|f| f.is_indicator())
            .count();
        if terms >= RESTRICTIVE_TERMS || indicators >= RESTRICTIVE_INDICATORS {
            return ZeroTradeDiagnosis {
                kind: DiagnosisKind::OverRestrictiveConditions,
                detail: format!(
                    "signal '{}' combines {terms} conjunctive terms over {indicators} indicators",
                    signal.id
                ),
                suggestions: vec![
                    "drop one clause from the condition".to_string(),
                    "widen the numeric thresholds".to_string(),
                ],
            };
        }
    }

    if spec.data_requirements.lookback > bars_count / 2 {
        return ZeroTradeDiagnosis {
            kind: DiagnosisKind::LookbackTooLong,
            detail: format!(
                "lookback {} exceeds half of the {bars_count} replayed bars",
                spec.data_requirements.lookback
            ),
            suggestions: vec![
                "reduce the lookback".to_string(),
                "fetch a longer history range".to_string(),
            ],
        };
    }

    ZeroTradeDiagnosis {
        kind: DiagnosisKind::Untriggered,
        detail: "conditions compiled and ran but never held".to_string(),
        suggestions: vec![
            "widen the history range".to_string(),
            "relax the signal thresholds".to_string(),
            "add a trend-following signal".to_string(),
        ],
    }
}
