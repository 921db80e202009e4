//! Core type definitions and `NewType` wrappers.

use thiserror::Error;

mod symbol;
mod timeframe;
mod timestamp;

pub use symbol::Symbol;
pub use timeframe::Timeframe;
pub use timestamp::Timestamp;

/// Validation errors for core types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Symbol string is empty.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Symbol contains invalid characters.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Timestamp is negative.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// Timeframe string is not recognized.
    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),
}
