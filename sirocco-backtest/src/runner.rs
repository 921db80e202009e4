//! Historical replay through the fast-path engine.

use tracing::{debug, info};

use sirocco_core::data::Bar;
use sirocco_engine::{EngineConfig, ExecutionEngine, Position};
use sirocco_strategy::{SignalAction, StrategySpec};

use crate::book::{ClosedTrade, PaperBook};
use crate::config::BacktestConfig;
use crate::error::BacktestError;
use crate::fill::FillModel;
use crate::metrics::BacktestReport;

/// Replays historical bars through a dedicated engine instance.
///
/// Backtests never share engine state with live trading: every run builds a
/// fresh `ExecutionEngine`, so cancelling or discarding a run leaves live
/// state untouched.
#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    /// Creates a backtester with the given configuration.
    #[must_use]
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Runs the spec over time-ordered bars belonging to its ticker.
    ///
    /// # Errors
    ///
    /// Returns `BacktestError` when the bars are empty, unsorted, or for the
    /// wrong ticker, or when the spec fails to load.
    pub fn run(&self, spec: StrategySpec, bars: &[Bar]) -> Result<BacktestReport, BacktestError> {
        let ticker = spec.ticker.clone();
        if bars.is_empty() {
            return Err(BacktestError::NoData(ticker));
        }
        for (index, window) in bars.windows(2).enumerate() {
            if window[1].timestamp < window[0].timestamp {
                return Err(BacktestError::UnsortedData {
                    index: index + 1,
                    current: window[0].timestamp.as_millis(),
                    next: window[1].timestamp.as_millis(),
                });
            }
        }
        if let Some((index, bar)) = bars
            .iter()
            .enumerate()
            .find(|(_, bar)| bar.ticker != ticker)
        {
            return Err(BacktestError::TickerMismatch {
                expected: ticker,
                found: bar.ticker.clone(),
                index,
            });
        }

        let mut engine = ExecutionEngine::new(EngineConfig::default());
        engine.load(spec)?;

        let fill = FillModel::new(self.config.commission_rate, self.config.slippage);
        let mut book = PaperBook::new(self.config.initial_capital, fill);
        let mut equity_curve = vec![(bars[0].timestamp, self.config.initial_capital)];

        for (index, bar) in bars.iter().enumerate() {
            if let Some(decision) = engine.on_bar(bar) {
                match decision.action {
                    SignalAction::Buy => {
                        if book.try_open(&decision, bar) {
                            engine.set_position(Position::long(
                                bar.ticker.clone(),
                                decision.entry_price,
                                book.open_quantity().unwrap_or(0.0),
                                bar.timestamp,
                                decision.stop_loss,
                                decision.take_profit,
                            ));
                            debug!(index, price = bar.close, signal = %decision.signal_id, "opened");
                        }
                    }
                    SignalAction::Sell => {
                        if let Some(closed) = book.close_on_signal(bar) {
                            self.sync_close(&mut engine, bar, &closed);
                            debug!(index, price = bar.close, signal = %decision.signal_id, "closed");
                        }
                    }
                    SignalAction::Hold => {}
                }
            }

            if let Some(closed) = book.maintain(bar) {
                self.sync_close(&mut engine, bar, &closed);
                debug!(index, reason = %closed.reason, "maintenance exit");
            }

            if (index + 1) % self.config.equity_sample_interval.max(1) == 0 {
                equity_curve.push((bar.timestamp, book.equity(bar.close)));
            }
        }

        let last_bar = bars.last().expect("bars checked non-empty");
        if let Some(closed) = book.close_all(last_bar) {
            self.sync_close(&mut engine, last_bar, &closed);
        }
        equity_curve.push((last_bar.timestamp, book.equity(last_bar.close)));

        let final_capital = book.cash();
        let trades = book.trades().to_vec();
        info!(
            ticker = %last_bar.ticker,
            bars = bars.len(),
            trades = trades.len(),
            final_capital,
            "backtest complete"
        );

        Ok(BacktestReport::from_run(
            last_bar.ticker.clone(),
            self.config.initial_capital,
            final_capital,
            trades,
            equity_curve,
        ))
    }

    /// Reflects a closed round trip back into the engine so the daily-loss
    /// and no-pyramiding gates see it.
    fn sync_close(&self, engine: &mut ExecutionEngine, bar: &Bar, closed: &ClosedTrade) {
        engine.clear_position(&bar.ticker);
        if self.config.initial_capital > 0.0 {
            engine.record_realized_pnl(
                bar.timestamp,
                closed.net_pnl / self.config.initial_capital,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirocco_core::types::{Symbol, Timeframe, Timestamp};
    use sirocco_strategy::{DataRequirements, RiskParameters, Signal};

    fn ticker() -> Symbol {
        Symbol::new("AAPL").unwrap()
    }

    fn bar_at(index: i64, close: f64) -> Bar {
        Bar::new(
            ticker(),
            Timestamp::new_unchecked(1_700_000_000_000 + index * 300_000),
            close,
            close + 0.5,
            close - 0.5,
            close,
            10_000.0,
        )
        .unwrap()
    }

    fn signal(id: &str, condition: &str, action: SignalAction, priority: i32) -> Signal {
        Signal {
            id: id.to_string(),
            condition: condition.to_string(),
            action,
            position_size: 0.1,
            confidence: 0.8,
            reasoning: "test".to_string(),
            priority,
        }
    }

    fn spec(signals: Vec<Signal>, risk: RiskParameters) -> StrategySpec {
        StrategySpec {
            id: "spec-backtest-test".to_string(),
            ticker: ticker(),
            timeframe: Timeframe::Min5,
            data_requirements: DataRequirements {
                indicators: vec![],
                lookback: 10,
                min_data_points: 1,
            },
            signals,
            risk_params: risk,
            compiled_at: Timestamp::new_unchecked(1_700_000_000_000),
            expires_at: Timestamp::new_unchecked(i64::MAX),
            source_query: "test".to_string(),
        }
    }

    #[test]
    fn test_empty_bars_rejected() {
        let backtester = Backtester::default();
        let result = backtester.run(
            spec(
                vec![signal("buy", "close > 0", SignalAction::Buy, 1)],
                RiskParameters::default(),
            ),
            &[],
        );
        assert!(matches!(result, Err(BacktestError::NoData(_))));
    }

    #[test]
    fn test_unsorted_bars_rejected() {
        let backtester = Backtester::default();
        let result = backtester.run(
            spec(
                vec![signal("buy", "close > 0", SignalAction::Buy, 1)],
                RiskParameters::default(),
            ),
            &[bar_at(1, 100.0), bar_at(0, 100.0)],
        );
        assert!(matches!(result, Err(BacktestError::UnsortedData { .. })));
    }

    #[test]
    fn test_ticker_mismatch_rejected() {
        let backtester = Backtester::default();
        let mut foreign = bar_at(1, 100.0);
        foreign.ticker = Symbol::new("MSFT").unwrap();
        let result = backtester.run(
            spec(
                vec![signal("buy", "close > 0", SignalAction::Buy, 1)],
                RiskParameters::default(),
            ),
            &[bar_at(0, 100.0), foreign],
        );
        assert!(matches!(result, Err(BacktestError::TickerMismatch { .. })));
    }

    #[test]
    fn test_single_round_trip_arithmetic() {
        // Spec scenario 2: commission 0.001, slippage 0.0005, one BUY at 100
        // and one SELL at 110.
        let backtester = Backtester::new(BacktestConfig {
            initial_capital: 100_000.0,
            commission_rate: 0.001,
            slippage: 0.0005,
            equity_sample_interval: 100,
        });
        // Disarm stop/take-profit so only the signals trade.
        let risk = RiskParameters {
            stop_loss: 0.9999,
            take_profit: 1.0,
            ..RiskParameters::default()
        };
        let report = backtester
            .run(
                spec(
                    vec![
                        signal("entry", "close == 100", SignalAction::Buy, 10),
                        signal("exit", "close == 110", SignalAction::Sell, 5),
                    ],
                    risk,
                ),
                &[bar_at(0, 100.0), bar_at(1, 105.0), bar_at(2, 110.0)],
            )
            .unwrap();

        assert_eq!(report.total_trades, 1);
        assert_eq!(report.win_rate, 100.0);
        assert_eq!(report.profit_factor, 0.0); // no losses: denominator guard

        // quantity = floor(10_000 / 100.05) = 99
        let entry = &report.trades[0];
        assert_eq!(entry.quantity, 99.0);
        assert!((entry.price - 100.05).abs() < 1e-9);

        let exit = &report.trades[1];
        assert!((exit.price - 109.945).abs() < 1e-9);
        let gross = 99.0 * (109.945 - 100.05);
        assert!((exit.pnl.unwrap() - gross).abs() < 1e-6);

        let fees = 99.0 * 100.05 * 0.001 + 99.0 * 109.945 * 0.001;
        assert!((report.total_pnl - (gross - fees)).abs() < 1e-6);
    }

    #[test]
    fn test_cash_identity_holds() {
        // Invariant: final = initial + sum(pnl) - sum(commission) with all
        // positions closed at end of run.
        let backtester = Backtester::new(BacktestConfig {
            initial_capital: 50_000.0,
            commission_rate: 0.002,
            slippage: 0.001,
            equity_sample_interval: 3,
        });
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (f64::from(i) * 0.8).sin() * 10.0)
            .collect();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar_at(i as i64, c))
            .collect();
        let report = backtester
            .run(
                spec(
                    vec![
                        signal("entry", "close < 93", SignalAction::Buy, 10),
                        signal("exit", "close > 107", SignalAction::Sell, 5),
                    ],
                    RiskParameters::default(),
                ),
                &bars,
            )
            .unwrap();

        assert!(report.total_trades > 0);
        let pnl_sum: f64 = report.trades.iter().filter_map(|t| t.pnl).sum();
        let commission_sum: f64 = report.trades.iter().map(|t| t.commission).sum();
        let expected = report.initial_capital + pnl_sum - commission_sum;
        assert!(
            (report.final_capital - expected).abs() < 1e-6,
            "identity violated: {} vs {}",
            report.final_capital,
            expected
        );
    }

    #[test]
    fn test_end_of_backtest_closes_open_position() {
        let backtester = Backtester::new(BacktestConfig {
            commission_rate: 0.0,
            slippage: 0.0,
            ..BacktestConfig::default()
        });
        let report = backtester
            .run(
                spec(
                    vec![signal("entry", "close == 100", SignalAction::Buy, 1)],
                    RiskParameters {
                        stop_loss: 0.9999,
                        take_profit: 1.0,
                        ..RiskParameters::default()
                    },
                ),
                &[bar_at(0, 100.0), bar_at(1, 104.0), bar_at(2, 106.0)],
            )
            .unwrap();
        let exit = report.trades.last().unwrap();
        assert_eq!(exit.action, SignalAction::Sell);
        assert_eq!(exit.reason, crate::trade::TradeReason::EndOfBacktest);
        assert_eq!(exit.price, 106.0);
        assert_eq!(report.total_trades, 1);
    }

    #[test]
    fn test_stop_loss_maintenance_exit() {
        let backtester = Backtester::new(BacktestConfig {
            commission_rate: 0.0,
            slippage: 0.0,
            ..BacktestConfig::default()
        });
        let report = backtester
            .run(
                spec(
                    vec![signal("entry", "close == 100", SignalAction::Buy, 1)],
                    RiskParameters {
                        stop_loss: 0.05,
                        take_profit: 0.10,
                        ..RiskParameters::default()
                    },
                ),
                &[bar_at(0, 100.0), bar_at(1, 94.0), bar_at(2, 94.0)],
            )
            .unwrap();
        let exit = &report.trades[1];
        assert_eq!(exit.reason, crate::trade::TradeReason::StopLoss);
        assert_eq!(exit.price, 95.0);
        assert_eq!(report.losing_trades, 1);
    }

    #[test]
    fn test_take_profit_maintenance_exit() {
        let backtester = Backtester::new(BacktestConfig {
            commission_rate: 0.0,
            slippage: 0.0,
            ..BacktestConfig::default()
        });
        let report = backtester
            .run(
                spec(
                    vec![signal("entry", "close == 100", SignalAction::Buy, 1)],
                    RiskParameters {
                        stop_loss: 0.05,
                        take_profit: 0.10,
                        ..RiskParameters::default()
                    },
                ),
                &[bar_at(0, 100.0), bar_at(1, 111.0), bar_at(2, 111.0)],
            )
            .unwrap();
        let exit = &report.trades[1];
        assert_eq!(exit.reason, crate::trade::TradeReason::TakeProfit);
        assert!((exit.price - 110.0).abs() < 1e-9);
        assert_eq!(report.winning_trades, 1);
    }

    #[test]
    fn test_zero_trades_report() {
        let backtester = Backtester::default();
        let bars: Vec<Bar> = (0..50).map(|i| bar_at(i, 100.0)).collect();
        let report = backtester
            .run(
                spec(
                    vec![signal("never", "close > 1000", SignalAction::Buy, 1)],
                    RiskParameters::default(),
                ),
                &bars,
            )
            .unwrap();
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.final_capital, report.initial_capital);
        assert_eq!(report.max_drawdown_pct, 0.0);
    }

    #[test]
    fn test_equity_curve_sampled_on_interval() {
        let backtester = Backtester::new(BacktestConfig {
            equity_sample_interval: 10,
            ..BacktestConfig::default()
        });
        let bars: Vec<Bar> = (0..35).map(|i| bar_at(i, 100.0)).collect();
        let report = backtester
            .run(
                spec(
                    vec![signal("never", "close > 1000", SignalAction::Buy, 1)],
                    RiskParameters::default(),
                ),
                &bars,
            )
            .unwrap();
        // Initial point + samples at bars 10/20/30 + final point.
        assert_eq!(report.equity_curve.len(), 5);
    }
}
