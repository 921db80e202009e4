//! Paper bookkeeping shared by the backtest runner and live paper trading.
//!
//! Keeping fills, stop/take-profit maintenance, and the trade ledger in one
//! place is what makes backtest and live execution deterministically
//! equivalent: both paths drive the same code over the same bar stream.

use tracing::debug;

use sirocco_core::data::Bar;
use sirocco_core::types::Timestamp;
use sirocco_engine::TradeDecision;
use sirocco_strategy::SignalAction;

use crate::fill::FillModel;
use crate::trade::{Trade, TradeReason};

/// Fraction of initial capital committed per entry (fixed sizing in v1;
/// per-signal sizing is a future extension).
const POSITION_FRACTION: f64 = 0.10;

/// An open lot awaiting its exit.
#[derive(Debug, Clone)]
struct OpenLot {
    quantity: f64,
    entry_price: f64,
    entry_ts: Timestamp,
    stop_loss: f64,
    take_profit: f64,
    entry_commission: f64,
}

/// Summary of a closed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    /// Gross P&L of the round trip (before commissions).
    pub gross_pnl: f64,
    /// Net P&L after both fills' commissions.
    pub net_pnl: f64,
    /// Exit reason.
    pub reason: TradeReason,
    /// Entry timestamp.
    pub entry_ts: Timestamp,
    /// Exit timestamp.
    pub exit_ts: Timestamp,
    /// Quantity closed.
    pub quantity: f64,
}

/// Cash, position, and ledger state for one paper session.
#[derive(Debug)]
pub struct PaperBook {
    initial_capital: f64,
    cash: f64,
    fill: FillModel,
    open: Option<OpenLot>,
    trades: Vec<Trade>,
    consecutive_losses: u32,
    session_net_pnl: f64,
}

impl PaperBook {
    /// Creates a book with the given starting cash and fill model.
    #[must_use]
    pub fn new(initial_capital: f64, fill: FillModel) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            fill,
            open: None,
            trades: Vec::new(),
            consecutive_losses: 0,
            session_net_pnl: 0.0,
        }
    }

    /// Attempts to open a long position from a BUY decision.
    ///
    /// Sizing is a fixed 10% of initial capital:
    /// `floor(initial_capital * 0.10 / exec_price)`. The order is skipped
    /// when cash cannot cover cost plus commission or the quantity floors to
    /// zero. Returns true if the position was opened.
    pub fn try_open(&mut self, decision: &TradeDecision, bar: &Bar) -> bool {
        debug_assert_eq!(decision.action, SignalAction::Buy);
        if self.open.is_some() {
            return false;
        }
        let exec_price = self.fill.buy_price(bar.close);
        let quantity = (self.initial_capital * POSITION_FRACTION / exec_price).floor();
        if quantity <= 0.0 {
            return false;
        }
        let cost = quantity * exec_price;
        let commission = self.fill.commission(exec_price, quantity);
        if cost + commission > self.cash {
            debug!(cost, commission, cash = self.cash, "order skipped: insufficient cash");
            return false;
        }
        self.cash -= cost + commission;
        self.open = Some(OpenLot {
            quantity,
            entry_price: exec_price,
            entry_ts: bar.timestamp,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            entry_commission: commission,
        });
        self.trades.push(Trade {
            ticker: bar.ticker.clone(),
            action: SignalAction::Buy,
            price: exec_price,
            quantity,
            timestamp: bar.timestamp,
            pnl: None,
            commission,
            reason: TradeReason::Signal,
        });
        true
    }

    /// Closes the open position on a SELL signal at the slipped close.
    pub fn close_on_signal(&mut self, bar: &Bar) -> Option<ClosedTrade> {
        let exit_price = self.fill.sell_price(bar.close);
        self.close_at(exit_price, bar, TradeReason::Signal)
    }

    /// Stop-loss / take-profit maintenance for the bar.
    ///
    /// Stop-loss is checked before take-profit; exits fill at the trigger
    /// price exactly.
    pub fn maintain(&mut self, bar: &Bar) -> Option<ClosedTrade> {
        let lot = self.open.as_ref()?;
        if bar.price() <= lot.stop_loss {
            let price = lot.stop_loss;
            return self.close_at(price, bar, TradeReason::StopLoss);
        }
        if bar.price() >= lot.take_profit {
            let price = lot.take_profit;
            return self.close_at(price, bar, TradeReason::TakeProfit);
        }
        None
    }

    /// Force-closes any open position at the bar close.
    pub fn close_all(&mut self, bar: &Bar) -> Option<ClosedTrade> {
        self.close_at(bar.close, bar, TradeReason::EndOfBacktest)
    }

    fn close_at(&mut self, price: f64, bar: &Bar, reason: TradeReason) -> Option<ClosedTrade> {
        let lot = self.open.take()?;
        let proceeds = lot.quantity * price;
        let commission = self.fill.commission(price, lot.quantity);
        self.cash += proceeds - commission;

        let gross_pnl = (price - lot.entry_price) * lot.quantity;
        let net_pnl = gross_pnl - lot.entry_commission - commission;
        self.session_net_pnl += net_pnl;
        if gross_pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        self.trades.push(Trade {
            ticker: bar.ticker.clone(),
            action: SignalAction::Sell,
            price,
            quantity: lot.quantity,
            timestamp: bar.timestamp,
            pnl: Some(gross_pnl),
            commission,
            reason,
        });

        Some(ClosedTrade {
            gross_pnl,
            net_pnl,
            reason,
            entry_ts: lot.entry_ts,
            exit_ts: bar.timestamp,
            quantity: lot.quantity,
        })
    }

    /// Current equity marking any open position at the given price.
    #[must_use]
    pub fn equity(&self, mark_price: f64) -> f64 {
        let position_value = self
            .open
            .as_ref()
            .map_or(0.0, |lot| lot.quantity * mark_price);
        self.cash + position_value
    }

    /// Returns true if a position is open.
    #[must_use]
    pub fn has_open_position(&self) -> bool {
        self.open.is_some()
    }

    /// Open quantity, if any.
    #[must_use]
    pub fn open_quantity(&self) -> Option<f64> {
        self.open.as_ref().map(|lot| lot.quantity)
    }

    /// Current cash.
    #[must_use]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Starting cash.
    #[must_use]
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// The ledger so far.
    #[must_use]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Consecutive losing round trips (gross P&L below zero).
    #[must_use]
    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Realized net P&L this session, as an absolute amount.
    #[must_use]
    pub fn session_net_pnl(&self) -> f64 {
        self.session_net_pnl
    }

    /// Realized net P&L as a fraction of initial capital.
    #[must_use]
    pub fn session_pnl_fraction(&self) -> f64 {
        if self.initial_capital == 0.0 {
            return 0.0;
        }
        self.session_net_pnl / self.initial_capital
    }
}
