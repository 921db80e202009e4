//! Backtest error types.

use thiserror::Error;

use sirocco_core::error::SiroccoError;
use sirocco_core::types::Symbol;

/// Backtest error type.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// No bars were supplied.
    #[error("no bars supplied for {0}")]
    NoData(Symbol),

    /// Bars are not sorted chronologically.
    #[error("bars are not sorted chronologically at index {index}: {current} > {next}")]
    UnsortedData {
        /// Index where the violation occurred.
        index: usize,
        /// Timestamp at `index - 1`.
        current: i64,
        /// Timestamp at `index` (should be >= current).
        next: i64,
    },

    /// A bar belongs to a different ticker than the spec.
    #[error("bar {index} is for {found}, spec trades {expected}")]
    TickerMismatch {
        /// Ticker the spec trades.
        expected: Symbol,
        /// Ticker found on the bar.
        found: Symbol,
        /// Index of the offending bar.
        index: usize,
    },

    /// The spec failed to load into the replay engine.
    #[error(transparent)]
    Load(#[from] SiroccoError),
}
