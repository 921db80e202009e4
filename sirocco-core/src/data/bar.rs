//! OHLCV bar data structure.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DataError;
use crate::types::{Symbol, Timestamp};

/// One OHLCV sample at a given timeframe.
///
/// Bars are immutable once constructed. Construction validates that every
/// field is finite, that `low <= open, close <= high`, and that volume is
/// non-negative; fetchers drop null rows before ever constructing a `Bar`.
///
/// # Examples
///
/// ```
/// use sirocco_core::data::Bar;
/// use sirocco_core::types::{Symbol, Timestamp};
///
/// let bar = Bar::new(
///     Symbol::new("AAPL").unwrap(),
///     Timestamp::new(1_704_067_200_000).unwrap(),
///     187.0,
///     189.5,
///     186.2,
///     188.9,
///     52_000_000.0,
/// )
/// .unwrap();
/// assert_eq!(bar.price(), 188.9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Ticker the bar belongs to.
    pub ticker: Symbol,
    /// Bar open timestamp in Unix milliseconds.
    pub timestamp: Timestamp,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Trading volume.
    pub volume: f64,
}

impl Bar {
    /// Creates a new validated bar.
    ///
    /// # Errors
    ///
    /// Returns `DataError::InvalidBar` if any field is non-finite, the
    /// low/high envelope does not contain open and close, or volume is
    /// negative.
    pub fn new(
        ticker: Symbol,
        timestamp: Timestamp,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, DataError> {
        for (name, value) in [
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
            ("volume", volume),
        ] {
            if !value.is_finite() {
                return Err(DataError::InvalidBar {
                    reason: format!("{name} is not finite"),
                });
            }
        }
        if high < low {
            return Err(DataError::InvalidBar {
                reason: format!("high ({high}) < low ({low})"),
            });
        }
        if open < low || open > high {
            return Err(DataError::InvalidBar {
                reason: format!("open ({open}) outside low-high range ({low}-{high})"),
            });
        }
        if close < low || close > high {
            return Err(DataError::InvalidBar {
                reason: format!("close ({close}) outside low-high range ({low}-{high})"),
            });
        }
        if volume < 0.0 {
            return Err(DataError::InvalidBar {
                reason: format!("negative volume ({volume})"),
            });
        }
        Ok(Self {
            ticker,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Returns the reference price of the bar (its close).
    #[must_use]
    pub const fn price(&self) -> f64 {
        self.close
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl fmt::Display for Bar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} o={} h={} l={} c={} v={}",
            self.ticker, self.timestamp, self.open, self.high, self.low, self.close, self.volume
        )
    }
}
