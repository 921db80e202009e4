//! Backtest result metrics.

use serde::{Deserialize, Serialize};

use sirocco_core::types::{Symbol, Timestamp};
use sirocco_strategy::SignalAction;

use crate::trade::Trade;

/// Annualization factor for the Sharpe ratio (trading days per year).
const ANNUALIZATION: f64 = 252.0;

/// Aggregated result of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Ticker replayed.
    pub ticker: Symbol,
    /// Starting cash.
    pub initial_capital: f64,
    /// Ending equity (all positions closed at end of run).
    pub final_capital: f64,
    /// Number of completed round trips (SELL fills).
    pub total_trades: u64,
    /// Round trips with positive gross P&L.
    pub winning_trades: u64,
    /// Round trips with negative gross P&L.
    pub losing_trades: u64,
    /// `winning / total * 100`; 0 with no trades.
    pub win_rate: f64,
    /// `final_capital - initial_capital`.
    pub total_pnl: f64,
    /// `(final / initial - 1) * 100`.
    pub total_return_pct: f64,
    /// Mean gross P&L of winning trades; 0 with none.
    pub avg_win: f64,
    /// Mean absolute gross P&L of losing trades; 0 with none.
    pub avg_loss: f64,
    /// `avg_win / avg_loss`; 0 when `avg_loss` is 0.
    pub profit_factor: f64,
    /// Maximum peak-to-trough equity drop as a percentage of the peak.
    pub max_drawdown_pct: f64,
    /// Annualized Sharpe ratio over per-sample equity returns; 0 when the
    /// return deviation is 0.
    pub sharpe_ratio: f64,
    /// Mean holding time of completed round trips, in milliseconds.
    pub avg_holding_time_ms: f64,
    /// The full trade ledger.
    pub trades: Vec<Trade>,
    /// Sampled equity curve.
    pub equity_curve: Vec<(Timestamp, f64)>,
}

impl BacktestReport {
    /// Builds a report from the ledger and equity curve.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_run(
        ticker: Symbol,
        initial_capital: f64,
        final_capital: f64,
        trades: Vec<Trade>,
        equity_curve: Vec<(Timestamp, f64)>,
    ) -> Self {
        let closing: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.action == SignalAction::Sell)
            .collect();
        let total_trades = closing.len() as u64;

        let wins: Vec<f64> = closing
            .iter()
            .filter_map(|t| t.pnl)
            .filter(|p| *p > 0.0)
            .collect();
        let losses: Vec<f64> = closing
            .iter()
            .filter_map(|t| t.pnl)
            .filter(|p| *p < 0.0)
            .map(f64::abs)
            .collect();

        let winning_trades = wins.len() as u64;
        let losing_trades = losses.len() as u64;

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        let profit_factor = if avg_loss == 0.0 { 0.0 } else { avg_win / avg_loss };

        let total_pnl = final_capital - initial_capital;
        let total_return_pct = if initial_capital == 0.0 {
            0.0
        } else {
            (final_capital / initial_capital - 1.0) * 100.0
        };

        Self {
            ticker,
            initial_capital,
            final_capital,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_pnl,
            total_return_pct,
            avg_win,
            avg_loss,
            profit_factor,
            max_drawdown_pct: max_drawdown_pct(&equity_curve),
            sharpe_ratio: sharpe_ratio(&equity_curve),
            avg_holding_time_ms: avg_holding_time_ms(&trades),
            trades,
            equity_curve,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Maximum peak-to-trough drop as a percentage of the running peak.
fn max_drawdown_pct(equity_curve: &[(Timestamp, f64)]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &(_, equity) in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let dd = (peak - equity) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio over per-sample equity returns.
#[allow(clippy::cast_precision_loss)]
fn sharpe_ratio(equity_curve: &[(Timestamp, f64)]) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].1 != 0.0)
        .map(|w| w[1].1 / w[0].1 - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean_return = returns.iter().sum::<f64>() / n;
    let variance = returns
        .iter()
        .map(|r| {
            let d = r - mean_return;
            d * d
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    mean_return / std_dev * ANNUALIZATION.sqrt()
}

/// Mean `sell_ts - paired_buy_ts` over completed round trips.
#[allow(clippy::cast_precision_loss)]
fn avg_holding_time_ms(trades: &[Trade]) -> f64 {
    let mut entry_ts: Option<i64> = None;
    let mut holds = Vec::new();
    for trade in trades {
        match trade.action {
            SignalAction::Buy => entry_ts = Some(trade.timestamp.as_millis()),
            SignalAction::Sell => {
                if let Some(entry) = entry_ts.take() {
                    holds.push((trade.timestamp.as_millis() - entry) as f64);
                }
            }
            SignalAction::Hold => {}
        }
    }
    mean(&holds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::TradeReason;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::new_unchecked(millis)
    }

    fn sell(pnl: f64, at: i64) -> Trade {
        Trade {
            ticker: Symbol::new("AAPL").unwrap(),
            action: SignalAction::Sell,
            price: 100.0,
            quantity: 10.0,
            timestamp: ts(at),
            pnl: Some(pnl),
            commission: 1.0,
            reason: TradeReason::Signal,
        }
    }

    fn buy(at: i64) -> Trade {
        Trade {
            ticker: Symbol::new("AAPL").unwrap(),
            action: SignalAction::Buy,
            price: 100.0,
            quantity: 10.0,
            timestamp: ts(at),
            pnl: None,
            commission: 1.0,
            reason: TradeReason::Signal,
        }
    }

    #[test]
    fn test_report_counts_and_rates() {
        let trades = vec![
            buy(0),
            sell(500.0, 1_000),
            buy(2_000),
            sell(-200.0, 3_000),
            buy(4_000),
            sell(300.0, 7_000),
        ];
        let curve = vec![(ts(0), 100_000.0), (ts(7_000), 100_600.0)];
        let report = BacktestReport::from_run(
            Symbol::new("AAPL").unwrap(),
            100_000.0,
            100_594.0,
            trades,
            curve,
        );
        assert_eq!(report.total_trades, 3);
        assert_eq!(report.winning_trades, 2);
        assert_eq!(report.losing_trades, 1);
        assert!((report.win_rate - 2.0 / 3.0 * 100.0).abs() < 1e-9);
        assert!((report.avg_win - 400.0).abs() < 1e-9);
        assert!((report.avg_loss - 200.0).abs() < 1e-9);
        assert!((report.profit_factor - 2.0).abs() < 1e-9);
        assert!((report.total_pnl - 594.0).abs() < 1e-9);
        // Holding: 1000 + 1000 + 3000 over three trips.
        assert!((report.avg_holding_time_ms - 5_000.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_no_trades() {
        let curve = vec![(ts(0), 100_000.0), (ts(1_000), 100_000.0)];
        let report = BacktestReport::from_run(
            Symbol::new("AAPL").unwrap(),
            100_000.0,
            100_000.0,
            vec![],
            curve,
        );
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.profit_factor, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
    }

    #[test]
    fn test_profit_factor_zero_without_losses() {
        let trades = vec![buy(0), sell(500.0, 1_000)];
        let report = BacktestReport::from_run(
            Symbol::new("AAPL").unwrap(),
            100_000.0,
            100_500.0,
            trades,
            vec![(ts(0), 100_000.0), (ts(1_000), 100_500.0)],
        );
        assert_eq!(report.losing_trades, 0);
        assert_eq!(report.profit_factor, 0.0);
        assert_eq!(report.win_rate, 100.0);
    }

    #[test]
    fn test_max_drawdown_zero_on_monotone_equity() {
        let curve: Vec<(Timestamp, f64)> = (0..10)
            .map(|i| (ts(i * 1_000), 100_000.0 + f64::from(i as i32) * 10.0))
            .collect();
        assert_eq!(max_drawdown_pct(&curve), 0.0);
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        let curve = vec![
            (ts(0), 100_000.0),
            (ts(1), 110_000.0),
            (ts(2), 99_000.0),
            (ts(3), 120_000.0),
            (ts(4), 115_000.0),
        ];
        // Worst: 110_000 -> 99_000 = 10%.
        assert!((max_drawdown_pct(&curve) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_zero_when_flat() {
        let curve: Vec<(Timestamp, f64)> =
            (0..10).map(|i| (ts(i * 1_000), 100_000.0)).collect();
        assert_eq!(sharpe_ratio(&curve), 0.0);
    }

    #[test]
    fn test_sharpe_positive_for_steady_gains() {
        // Mixed but mostly positive returns yield a positive ratio.
        let curve = vec![
            (ts(0), 100_000.0),
            (ts(1), 101_000.0),
            (ts(2), 100_500.0),
            (ts(3), 102_000.0),
            (ts(4), 103_000.0),
        ];
        assert!(sharpe_ratio(&curve) > 0.0);
    }
}
