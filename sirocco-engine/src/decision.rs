//! Trade decision emitted by the fast path.

use serde::{Deserialize, Serialize};
use std::fmt;

use sirocco_core::types::{Symbol, Timestamp};
use sirocco_strategy::SignalAction;

/// One decision emitted by the execution engine.
///
/// `latency_ns` is measured wall-clock and excluded from replay-determinism
/// comparisons; every other field is a pure function of the bar stream and
/// the loaded spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    /// Requested action.
    pub action: SignalAction,
    /// Ticker the decision applies to.
    pub ticker: Symbol,
    /// Fraction of capital the signal requested.
    pub position_size: f64,
    /// Reference entry price (the bar close).
    pub entry_price: f64,
    /// Stop-loss price derived from the risk parameters.
    pub stop_loss: f64,
    /// Take-profit price derived from the risk parameters.
    pub take_profit: f64,
    /// Producer confidence carried from the signal.
    pub confidence: f64,
    /// Signal rationale carried from the signal.
    pub reasoning: String,
    /// Id of the signal that fired.
    pub signal_id: String,
    /// Decision latency from `on_bar` entry, in nanoseconds.
    pub latency_ns: u64,
    /// Timestamp of the bar that produced the decision.
    pub timestamp: Timestamp,
}

impl fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} (signal={}, size={:.2}, sl={:.2}, tp={:.2})",
            self.action,
            self.ticker,
            self.entry_price,
            self.signal_id,
            self.position_size,
            self.stop_loss,
            self.take_profit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_serde_roundtrip() {
        let decision = TradeDecision {
            action: SignalAction::Buy,
            ticker: Symbol::new("AAPL").unwrap(),
            position_size: 0.1,
            entry_price: 100.0,
            stop_loss: 95.0,
            take_profit: 110.0,
            confidence: 0.8,
            reasoning: "dip".to_string(),
            signal_id: "rsi_dip".to_string(),
            latency_ns: 12_345,
            timestamp: Timestamp::new_unchecked(1_000),
        };
        let json = serde_json::to_string(&decision).unwrap();
        let parsed: TradeDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, parsed);
        assert!(json.contains("\"action\":\"BUY\""));
    }
}
