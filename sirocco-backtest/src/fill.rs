//! Fill price and commission arithmetic.

use serde::{Deserialize, Serialize};

/// Slippage and commission model.
///
/// Slippage is adverse on both sides: buys fill above the close, sells fill
/// below it. Commission is a fraction of fill notional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillModel {
    /// Commission as a fraction of notional.
    pub commission_rate: f64,
    /// Slippage as a fraction of price.
    pub slippage: f64,
}

impl FillModel {
    /// Creates a fill model.
    #[must_use]
    pub const fn new(commission_rate: f64, slippage: f64) -> Self {
        Self {
            commission_rate,
            slippage,
        }
    }

    /// Buy fill price for a bar close.
    #[must_use]
    pub fn buy_price(&self, close: f64) -> f64 {
        close * (1.0 + self.slippage)
    }

    /// Sell fill price for a bar close.
    #[must_use]
    pub fn sell_price(&self, close: f64) -> f64 {
        close * (1.0 - self.slippage)
    }

    /// Commission on a fill.
    #[must_use]
    pub fn commission(&self, price: f64, quantity: f64) -> f64 {
        price * quantity * self.commission_rate
    }
}
