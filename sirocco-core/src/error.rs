//! Error types and handling framework.
//!
//! The error system is organized hierarchically:
//! - `SiroccoError` - Top-level error type
//!   - `SpecError` - Strategy spec schema/invariant violations
//!   - `ConditionError` - Condition compilation failures
//!   - `DataError` - Bar validation and history fetch errors
//!   - `RiskError` - Risk-gate rejections (locally recovered)
//!   - `EngineError` - Unreachable-state assertions
//!
//! Risk-gate rejections are ordinary values on the fast path: the decision
//! loop consumes them to skip a candidate signal and continue. They are part
//! of the hierarchy so the slow path can render any rejection uniformly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strategy spec schema or invariant violation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpecError {
    /// Generic schema violation.
    #[error("invalid spec: {reason}")]
    Invalid {
        /// Human-readable description of the violation.
        reason: String,
    },

    /// A spec must carry at least one signal.
    #[error("spec has no signals")]
    EmptySignals,

    /// Signal ids must be unique within a spec.
    #[error("duplicate signal id: {0}")]
    DuplicateSignalId(String),

    /// A fractional parameter is outside its allowed range.
    #[error("{field} = {value} outside allowed range [{min}, {max}]")]
    OutOfRange {
        /// Parameter name.
        field: String,
        /// Offending value.
        value: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },

    /// Lookback must cover the largest requested indicator period.
    #[error("lookback {lookback} < max indicator period {required}")]
    LookbackTooShort {
        /// Declared lookback.
        lookback: usize,
        /// Largest period among requested indicators.
        required: usize,
    },

    /// Minimum data points must cover warmup for delta-based indicators.
    #[error("min_data_points {min_data_points} < required warmup {required}")]
    MinDataPointsTooSmall {
        /// Declared minimum.
        min_data_points: usize,
        /// Required warmup length.
        required: usize,
    },

    /// An indicator name in the data requirements is not recognized.
    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    /// A signal condition failed to compile.
    #[error("signal '{signal_id}': {source}")]
    Condition {
        /// Id of the offending signal.
        signal_id: String,
        /// The compilation failure.
        #[source]
        source: ConditionError,
    },
}

/// Condition string compilation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionError {
    /// Expression is empty or whitespace.
    #[error("empty condition")]
    Empty,

    /// A character outside the allowed set was found.
    #[error("forbidden character '{ch}' at position {position}")]
    ForbiddenCharacter {
        /// The offending character.
        ch: char,
        /// Byte offset in the expression.
        position: usize,
    },

    /// An identifier on the deny-list was found.
    #[error("forbidden token '{token}'")]
    ForbiddenToken {
        /// The denied identifier.
        token: String,
    },

    /// An identifier does not resolve to an enriched-bar field.
    #[error("unknown identifier '{ident}' at position {position}")]
    UnknownIdentifier {
        /// The unresolved identifier.
        ident: String,
        /// Byte offset in the expression.
        position: usize,
    },

    /// Syntax error.
    #[error("parse error at position {position}: {message}")]
    Parse {
        /// What went wrong.
        message: String,
        /// Byte offset in the expression.
        position: usize,
    },
}

/// Bar validation and history errors.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataError {
    /// Bar fields failed validation.
    #[error("invalid bar: {reason}")]
    InvalidBar {
        /// Description of the violation.
        reason: String,
    },

    /// Not enough history to satisfy a requirement. Non-fatal; recovered by
    /// range escalation or a silent `None` on the fast path.
    #[error("insufficient history: required {required}, available {available}")]
    InsufficientHistory {
        /// Required number of bars.
        required: usize,
        /// Bars actually available.
        available: usize,
    },

    /// External fetch failed.
    #[error("data fetch failed: {reason}")]
    Fetch {
        /// Transport or provider error description.
        reason: String,
    },

    /// Provider response could not be parsed.
    #[error("data parse failed: {reason}")]
    Parse {
        /// Description of the malformed payload.
        reason: String,
    },

    /// Every escalation range was exhausted without enough bars.
    #[error("history ranges exhausted for {ticker}: required {required} bars")]
    RangesExhausted {
        /// Ticker that could not be satisfied.
        ticker: String,
        /// Required number of bars.
        required: usize,
    },
}

/// Risk-gate rejection. Local recovery: the decision loop continues with the
/// next candidate signal.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskError {
    /// Session daily loss limit breached.
    #[error("daily loss limit: pnl {pnl_fraction:.4} <= -{limit:.4}")]
    DailyLossLimit {
        /// Current daily P&L as a fraction of capital.
        pnl_fraction: f64,
        /// Configured limit fraction.
        limit: f64,
    },

    /// A non-flat position already exists for the ticker.
    #[error("position already open for {ticker}")]
    PositionAlreadyOpen {
        /// Ticker with the open position.
        ticker: String,
    },

    /// Candidate signal requests more than the allowed position size.
    #[error("position size {requested:.4} exceeds max {max:.4}")]
    PositionSizeExceeded {
        /// Requested fraction of capital.
        requested: f64,
        /// Maximum allowed fraction.
        max: f64,
    },
}

/// Unreachable-state assertion. Fail fast, abort the current task.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    /// An internal invariant was violated.
    #[error("engine invariant violated: {0}")]
    Invariant(String),
}

/// Top-level error type for the Sirocco pipeline.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SiroccoError {
    /// Strategy spec violation.
    #[error("{0}")]
    Spec(#[from] SpecError),

    /// Condition compilation failure.
    #[error("{0}")]
    Condition(#[from] ConditionError),

    /// Data validation or fetch failure.
    #[error("{0}")]
    Data(#[from] DataError),

    /// Risk-gate rejection.
    #[error("{0}")]
    Risk(#[from] RiskError),

    /// Engine invariant violation.
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl SiroccoError {
    /// Returns the error category as a string.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Spec(_) => "spec",
            Self::Condition(_) => "condition",
            Self::Data(_) => "data",
            Self::Risk(_) => "risk",
            Self::Engine(_) => "engine",
        }
    }

    /// Returns true if the error is recoverable without operator action.
    ///
    /// Risk rejections and insufficient history recover locally; everything
    /// else surfaces to the orchestrator.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Risk(_) | Self::Data(DataError::InsufficientHistory { .. })
        )
    }
}

/// A specialized `Result` type for Sirocco operations.
pub type Result<T> = std::result::Result<T, SiroccoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category() {
        let err: SiroccoError = SpecError::EmptySignals.into();
        assert_eq!(err.category(), "spec");

        let err: SiroccoError = ConditionError::Empty.into();
        assert_eq!(err.category(), "condition");

        let err: SiroccoError = EngineError::Invariant("bad".to_string()).into();
        assert_eq!(err.category(), "engine");
    }

    #[test]
    fn test_is_recoverable() {
        let risk: SiroccoError = RiskError::PositionAlreadyOpen {
            ticker: "AAPL".to_string(),
        }
        .into();
        assert!(risk.is_recoverable());

        let history: SiroccoError = DataError::InsufficientHistory {
            required: 100,
            available: 10,
        }
        .into();
        assert!(history.is_recoverable());

        let fetch: SiroccoError = DataError::Fetch {
            reason: "timeout".to_string(),
        }
        .into();
        assert!(!fetch.is_recoverable());

        let spec: SiroccoError = SpecError::EmptySignals.into();
        assert!(!spec.is_recoverable());
    }

    #[test]
    fn test_display_condition_error() {
        let err = ConditionError::ForbiddenToken {
            token: "process".to_string(),
        };
        assert_eq!(err.to_string(), "forbidden token 'process'");
    }

    #[test]
    fn test_display_spec_condition_chain() {
        let err = SpecError::Condition {
            signal_id: "rsi_dip".to_string(),
            source: ConditionError::Empty,
        };
        assert!(err.to_string().contains("rsi_dip"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let err: SiroccoError = RiskError::PositionSizeExceeded {
            requested: 0.5,
            max: 0.2,
        }
        .into();
        let json = serde_json::to_string(&err).unwrap();
        let parsed: SiroccoError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, parsed);
    }
}
