//! Position tracking types.

use serde::{Deserialize, Serialize};
use std::fmt;

use sirocco_core::types::{Symbol, Timestamp};

/// Which side a position is on. Long-only in v1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    /// No position.
    Flat,
    /// Long position.
    Long,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "FLAT"),
            Self::Long => write!(f, "LONG"),
        }
    }
}

/// A tracked position. At most one non-flat position exists per ticker per
/// engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Ticker.
    pub ticker: Symbol,
    /// Side.
    pub side: PositionSide,
    /// Fill price at entry.
    pub entry_price: f64,
    /// Quantity held.
    pub quantity: f64,
    /// Entry timestamp.
    pub entry_ts: Timestamp,
    /// Stop-loss trigger price.
    pub stop_loss_price: f64,
    /// Take-profit trigger price.
    pub take_profit_price: f64,
}

impl Position {
    /// Creates an open long position.
    #[must_use]
    pub fn long(
        ticker: Symbol,
        entry_price: f64,
        quantity: f64,
        entry_ts: Timestamp,
        stop_loss_price: f64,
        take_profit_price: f64,
    ) -> Self {
        Self {
            ticker,
            side: PositionSide::Long,
            entry_price,
            quantity,
            entry_ts,
            stop_loss_price,
            take_profit_price,
        }
    }

    /// Returns true if the position is open (non-flat).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.side != PositionSide::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_position_is_open() {
        let position = Position::long(
            Symbol::new("AAPL").unwrap(),
            100.0,
            50.0,
            Timestamp::new_unchecked(1_000),
            95.0,
            110.0,
        );
        assert!(position.is_open());
        assert_eq!(position.side, PositionSide::Long);
    }

    #[test]
    fn test_side_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&PositionSide::Flat).unwrap(),
            "\"FLAT\""
        );
        let parsed: PositionSide = serde_json::from_str("\"LONG\"").unwrap();
        assert_eq!(parsed, PositionSide::Long);
    }
}
