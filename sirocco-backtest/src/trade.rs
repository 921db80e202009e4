//! Trade ledger entries.

use serde::{Deserialize, Serialize};
use std::fmt;

use sirocco_core::types::{Symbol, Timestamp};
use sirocco_strategy::SignalAction;

/// Why a fill happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    /// A signal fired.
    Signal,
    /// Stop-loss maintenance exit.
    StopLoss,
    /// Take-profit maintenance exit.
    TakeProfit,
    /// Forced close at the end of the replay.
    EndOfBacktest,
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => write!(f, "signal"),
            Self::StopLoss => write!(f, "stop_loss"),
            Self::TakeProfit => write!(f, "take_profit"),
            Self::EndOfBacktest => write!(f, "end_of_backtest"),
        }
    }
}

/// One ledger entry. `pnl` is the gross round-trip P&L, present only on the
/// closing trade; commissions are recorded separately so the cash identity
/// `final = initial + sum(pnl) - sum(commission)` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Ticker traded.
    pub ticker: Symbol,
    /// BUY or SELL (HOLD never reaches the ledger).
    pub action: SignalAction,
    /// Fill price after slippage.
    pub price: f64,
    /// Quantity filled.
    pub quantity: f64,
    /// Fill timestamp.
    pub timestamp: Timestamp,
    /// Gross P&L, on closing trades only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    /// Commission charged on this fill.
    pub commission: f64,
    /// Why the fill happened.
    pub reason: TradeReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_serde_roundtrip() {
        let trade = Trade {
            ticker: Symbol::new("AAPL").unwrap(),
            action: SignalAction::Sell,
            price: 109.945,
            quantity: 99.0,
            timestamp: Timestamp::new_unchecked(2_000),
            pnl: Some(979.605),
            commission: 10.88,
            reason: TradeReason::TakeProfit,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"reason\":\"take_profit\""));
        let parsed: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, parsed);
    }

    #[test]
    fn test_open_trade_omits_pnl() {
        let trade = Trade {
            ticker: Symbol::new("AAPL").unwrap(),
            action: SignalAction::Buy,
            price: 100.05,
            quantity: 99.0,
            timestamp: Timestamp::new_unchecked(1_000),
            pnl: None,
            commission: 9.9,
            reason: TradeReason::Signal,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(!json.contains("pnl"));
    }
}
