//! The orchestrator context object.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use sirocco_backtest::{
    BacktestError, BacktestReport, Backtester, ClosedTrade, FillModel, PaperBook,
    ZeroTradeDiagnosis, diagnose_zero_trades,
};
use sirocco_core::data::Bar;
use sirocco_core::error::SiroccoError;
use sirocco_core::event::{EventKind, EventLevel, UiEvent};
use sirocco_core::types::Symbol;
use sirocco_data::{HistoryProvider, fetch_with_escalation};
use sirocco_engine::{ExecutionEngine, Position, TradeDecision};
use sirocco_strategy::{SignalAction, SpecProducer};

use crate::config::OrchestratorConfig;
use crate::gates::{GateReport, evaluate_start_gate};
use crate::mode::Mode;
use crate::refresh::RefreshTask;

/// Errors surfaced by orchestrator operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Spec, condition, data, or engine failure.
    #[error(transparent)]
    Pipeline(#[from] SiroccoError),

    /// Backtest input failure.
    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

/// Result of one research pass: compile → backtest → gate #1.
#[derive(Debug)]
pub struct ResearchOutcome {
    /// The compiled spec's id.
    pub spec_id: String,
    /// Ticker researched.
    pub ticker: Symbol,
    /// The backtest report.
    pub report: BacktestReport,
    /// Gate #1 evaluation.
    pub gate: GateReport,
    /// Zero-trade diagnosis, when the backtest never traded.
    pub diagnosis: Option<ZeroTradeDiagnosis>,
    /// Whether the spec was promoted to live paper trading.
    pub promoted: bool,
}

/// The hybrid orchestrator.
///
/// Owns the session mode, the live execution engine, and the paper books;
/// exclusively owns live specs (the engine reads them through its store).
/// All state is scoped to this instance so tests can run isolated
/// orchestrators in parallel.
pub struct Orchestrator {
    config: OrchestratorConfig,
    producer: Arc<dyn SpecProducer>,
    history: Arc<dyn HistoryProvider>,
    engine: ExecutionEngine,
    mode: Mode,
    books: HashMap<Symbol, PaperBook>,
    consecutive_losses: u32,
    session_net_pnl: f64,
    events_tx: mpsc::UnboundedSender<UiEvent>,
}

impl Orchestrator {
    /// Creates an orchestrator and the receiving end of its event stream.
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        producer: Arc<dyn SpecProducer>,
        history: Arc<dyn HistoryProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = ExecutionEngine::new(config.engine.clone());
        let orchestrator = Self {
            config,
            producer,
            history,
            engine,
            mode: Mode::Research,
            books: HashMap::new(),
            consecutive_losses: 0,
            session_net_pnl: 0.0,
            events_tx,
        };
        (orchestrator, events_rx)
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Realized session P&L as a fraction of configured capital.
    #[must_use]
    pub fn session_pnl_fraction(&self) -> f64 {
        if self.config.backtest.initial_capital == 0.0 {
            return 0.0;
        }
        self.session_net_pnl / self.config.backtest.initial_capital
    }

    /// Returns from PAUSED to RESEARCH. A no-op in any other mode.
    pub fn resume(&mut self) {
        if self.mode == Mode::Paused {
            self.transition(Mode::Research, "resumed by operator");
            self.consecutive_losses = 0;
            self.session_net_pnl = 0.0;
        }
    }

    /// Runs the full research flow: compile the query into a spec, fetch
    /// history with range escalation, backtest, and evaluate gate #1. A pass
    /// loads the spec live and transitions to TRADING.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError` when the producer, validation, history
    /// fetch, or backtest fails; the mode stays RESEARCH and the failure is
    /// also rendered on the event stream.
    pub async fn run_research(&mut self, query: &str) -> Result<ResearchOutcome, OrchestratorError> {
        self.emit(
            EventLevel::Info,
            EventKind::System,
            format!("research started: {query}"),
        );

        let spec = match self.producer.compile_strategy(query).await {
            Ok(spec) => spec,
            Err(err) => {
                self.emit(
                    EventLevel::Error,
                    EventKind::System,
                    format!("spec producer failed: {err}"),
                );
                return Err(err.into());
            }
        };
        if let Err(err) = spec.validate() {
            self.emit(
                EventLevel::Error,
                EventKind::System,
                format!("invalid spec {}: {err}", spec.id),
            );
            return Err(OrchestratorError::Pipeline(SiroccoError::from(err)));
        }

        let bars = match fetch_with_escalation(
            self.history.as_ref(),
            &spec.ticker,
            spec.timeframe,
            spec.data_requirements.min_data_points,
        )
        .await
        {
            Ok(bars) => bars,
            Err(err) => {
                self.emit(
                    EventLevel::Error,
                    EventKind::System,
                    format!("history fetch failed for {}: {err}", spec.ticker),
                );
                return Err(OrchestratorError::Pipeline(SiroccoError::from(err)));
            }
        };

        let backtester = Backtester::new(self.config.backtest.clone());
        let report = backtester.run(spec.clone(), &bars)?;
        let gate = evaluate_start_gate(&self.config.start_gate, &report);

        let mut diagnosis = None;
        let promoted = gate.passed;
        if gate.passed {
            self.emit(
                EventLevel::Ok,
                EventKind::Gate,
                format!(
                    "gate #1 passed for {}: {} trades, {:.2}% return, {:.2}% drawdown",
                    spec.ticker, report.total_trades, report.total_return_pct,
                    report.max_drawdown_pct
                ),
            );
            let ticker = spec.ticker.clone();
            let spec_id = spec.id.clone();
            self.engine.load(spec)?;
            self.transition(Mode::Trading, "start gate passed");
            return Ok(ResearchOutcome {
                spec_id,
                ticker,
                report,
                gate,
                diagnosis,
                promoted,
            });
        }

        self.emit(
            EventLevel::Warn,
            EventKind::Gate,
            format!(
                "gate #1 failed for {}: {}",
                spec.ticker,
                gate.failures.join("; ")
            ),
        );
        if report.total_trades == 0 {
            let diag = diagnose_zero_trades(&spec, bars.len());
            self.emit(
                EventLevel::Info,
                EventKind::System,
                format!("zero-trade diagnosis: {} ({})", diag.kind, diag.detail),
            );
            diagnosis = Some(diag);
        }

        Ok(ResearchOutcome {
            spec_id: spec.id.clone(),
            ticker: spec.ticker.clone(),
            report,
            gate,
            diagnosis,
            promoted,
        })
    }

    /// Feeds a live bar through the engine and the paper session, then
    /// evaluates the drift and redline gates.
    ///
    /// Returns the engine's decision, if any. Outside TRADING mode this is a
    /// no-op.
    pub fn on_live_bar(&mut self, bar: &Bar) -> Option<TradeDecision> {
        if self.mode != Mode::Trading {
            return None;
        }

        let decision = self.engine.on_bar(bar);

        if let Some(decision) = &decision {
            self.apply_decision(decision, bar);
        }

        let maintenance = self
            .books
            .get_mut(&bar.ticker)
            .and_then(|book| book.maintain(bar));
        if let Some(closed) = maintenance {
            self.settle_close(&bar.ticker, bar, &closed);
        }

        decision
    }

    fn apply_decision(&mut self, decision: &TradeDecision, bar: &Bar) {
        match decision.action {
            SignalAction::Buy => {
                let fill = FillModel::new(
                    self.config.backtest.commission_rate,
                    self.config.backtest.slippage,
                );
                let initial_capital = self.config.backtest.initial_capital;
                let opened = {
                    let book = self
                        .books
                        .entry(bar.ticker.clone())
                        .or_insert_with(|| PaperBook::new(initial_capital, fill));
                    if book.try_open(decision, bar) {
                        book.open_quantity()
                    } else {
                        None
                    }
                };
                if let Some(quantity) = opened {
                    self.engine.set_position(Position::long(
                        bar.ticker.clone(),
                        decision.entry_price,
                        quantity,
                        bar.timestamp,
                        decision.stop_loss,
                        decision.take_profit,
                    ));
                    self.emit(
                        EventLevel::Info,
                        EventKind::Trade,
                        format!(
                            "opened {} x{} @ {:.4} (signal {})",
                            bar.ticker, quantity, decision.entry_price, decision.signal_id
                        ),
                    );
                }
            }
            SignalAction::Sell => {
                let closed = self
                    .books
                    .get_mut(&bar.ticker)
                    .and_then(|book| book.close_on_signal(bar));
                if let Some(closed) = closed {
                    self.settle_close(&bar.ticker, bar, &closed);
                }
            }
            SignalAction::Hold => {}
        }
    }

    fn settle_close(&mut self, ticker: &Symbol, bar: &Bar, closed: &ClosedTrade) {
        self.engine.clear_position(ticker);
        if self.config.backtest.initial_capital > 0.0 {
            self.engine.record_realized_pnl(
                bar.timestamp,
                closed.net_pnl / self.config.backtest.initial_capital,
            );
        }
        self.session_net_pnl += closed.net_pnl;

        let level = if closed.gross_pnl >= 0.0 {
            EventLevel::Ok
        } else {
            EventLevel::Warn
        };
        self.emit(
            level,
            EventKind::Trade,
            format!(
                "closed {} ({}): gross {:.2}, net {:.2}",
                ticker, closed.reason, closed.gross_pnl, closed.net_pnl
            ),
        );

        // Gate #2: drift.
        if closed.gross_pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
        if self.consecutive_losses >= self.config.max_consecutive_losses {
            self.emit(
                EventLevel::Warn,
                EventKind::Drift,
                format!(
                    "{} consecutive losses reached, returning to research",
                    self.consecutive_losses
                ),
            );
            self.consecutive_losses = 0;
            self.transition(Mode::Research, "drift gate tripped");
            return;
        }

        // Gate #3: redline.
        let max_daily_loss = self
            .engine
            .spec_store()
            .snapshot(ticker)
            .map(|loaded| loaded.spec.risk_params.max_daily_loss);
        if let Some(limit) = max_daily_loss {
            let fraction = self.session_pnl_fraction();
            if fraction <= -limit {
                self.emit(
                    EventLevel::Error,
                    EventKind::Redline,
                    format!(
                        "session pnl {:.2}% breached daily loss limit {:.2}%",
                        fraction * 100.0,
                        limit * 100.0
                    ),
                );
                self.transition(Mode::Paused, "redline gate tripped");
            }
        }
    }

    fn transition(&mut self, to: Mode, why: &str) {
        if self.mode == to {
            return;
        }
        let from = self.mode;
        self.mode = to;
        let level = match to {
            Mode::Paused => EventLevel::Error,
            Mode::Research => EventLevel::Warn,
            Mode::Trading => EventLevel::Ok,
        };
        self.emit(
            level,
            EventKind::Mode,
            format!("{from} -> {to}: {why}"),
        );
    }

    fn emit(&self, level: EventLevel, kind: EventKind, message: String) {
        match level {
            EventLevel::Warn | EventLevel::Error => warn!(kind = %kind, "{message}"),
            EventLevel::Info | EventLevel::Ok => info!(kind = %kind, "{message}"),
        }
        let _ = self.events_tx.send(UiEvent::new(level, kind, message));
    }

    /// Spawns the background strategy refresh task.
    ///
    /// The task re-invokes the producer for every loaded ticker's source
    /// query on the configured interval and atomically replaces specs in the
    /// engine's store. A non-reentrant guard prevents overlapping cycles.
    #[must_use]
    pub fn spawn_refresh(&self) -> RefreshTask {
        RefreshTask::spawn(
            self.producer.clone(),
            self.engine.spec_store(),
            self.events_tx.clone(),
            self.config.strategy_refresh_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sirocco_core::error::DataError;
    use sirocco_core::types::{Timeframe, Timestamp};
    use sirocco_data::HistoryRange;
    use sirocco_strategy::{DataRequirements, RiskParameters, Signal, StrategySpec};

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

    fn trade_spec(risk: RiskParameters) -> StrategySpec {
        StrategySpec {
            id: "spec-orch-test".to_string(),
            ticker: ticker(),
            timeframe: Timeframe::Min5,
            data_requirements: DataRequirements {
                indicators: vec![],
                lookback: 10,
                min_data_points: 1,
            },
            signals: vec![
                Signal {
                    id: "entry".to_string(),
                    condition: "close == 100".to_string(),
                    action: SignalAction::Buy,
                    position_size: 0.1,
                    confidence: 0.8,
                    reasoning: "test entry".to_string(),
                    priority: 10,
                },
                Signal {
                    id: "exit".to_string(),
                    condition: "close == 110".to_string(),
                    action: SignalAction::Sell,
                    position_size: 0.1,
                    confidence: 0.8,
                    reasoning: "test exit".to_string(),
                    priority: 5,
                },
            ],
            risk_params: risk,
            compiled_at: Timestamp::new_unchecked(1_700_000_000_000),
            expires_at: Timestamp::new_unchecked(i64::MAX),
            source_query: "test query".to_string(),
        }
    }

    struct FixedProducer {
        spec: StrategySpec,
    }

    #[async_trait]
    impl SpecProducer for FixedProducer {
        async fn compile_strategy(&self, _query: &str) -> Result<StrategySpec, SiroccoError> {
            Ok(self.spec.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FixedHistory {
        bars: Vec<Bar>,
    }

    #[async_trait]
    impl HistoryProvider for FixedHistory {
        async fn fetch(
            &self,
            _ticker: &Symbol,
            _timeframe: Timeframe,
            _range: HistoryRange,
        ) -> Result<Vec<Bar>, DataError> {
            Ok(self.bars.clone())
        }
    }

    fn orchestrator_with(
        spec: StrategySpec,
        history: Vec<Bar>,
        config: OrchestratorConfig,
    ) -> (Orchestrator, mpsc::UnboundedReceiver<UiEvent>) {
        Orchestrator::new(
            config,
            Arc::new(FixedProducer { spec }),
            Arc::new(FixedHistory { bars: history }),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn permissive_config() -> OrchestratorConfig {
        OrchestratorConfig {
            start_gate: crate::gates::StartGateConfig {
                min_trades: 1,
                max_drawdown_pct: 100.0,
                min_return_pct: -100.0,
            },
            ..OrchestratorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_research_pass_promotes_to_trading() {
        let history = vec![bar_at(0, 100.0), bar_at(1, 105.0), bar_at(2, 110.0)];
        let (mut orchestrator, mut rx) = orchestrator_with(
            trade_spec(RiskParameters {
                stop_loss: 0.9999,
                take_profit: 1.0,
                ..RiskParameters::default()
            }),
            history,
            permissive_config(),
        );

        let outcome = orchestrator.run_research("buy the dip").await.unwrap();
        assert!(outcome.promoted);
        assert_eq!(orchestrator.mode(), Mode::Trading);
        assert_eq!(outcome.report.total_trades, 1);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Gate && e.level == EventLevel::Ok));
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Mode && e.message.contains("TRADING")));
    }

    #[tokio::test]
    async fn test_research_gate_failure_stays_research() {
        // Spec scenario 3 shape: too few trades, mode stays RESEARCH, a warn
        // gate event is emitted.
        let history = vec![bar_at(0, 100.0), bar_at(1, 105.0), bar_at(2, 110.0)];
        let config = OrchestratorConfig {
            start_gate: crate::gates::StartGateConfig {
                min_trades: 3,
                max_drawdown_pct: 20.0,
                min_return_pct: -5.0,
            },
            ..OrchestratorConfig::default()
        };
        let (mut orchestrator, mut rx) = orchestrator_with(
            trade_spec(RiskParameters {
                stop_loss: 0.9999,
                take_profit: 1.0,
                ..RiskParameters::default()
            }),
            history,
            config,
        );

        let outcome = orchestrator.run_research("buy the dip").await.unwrap();
        assert!(!outcome.promoted);
        assert_eq!(orchestrator.mode(), Mode::Research);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Gate && e.level == EventLevel::Warn));
        assert!(!events.iter().any(|e| e.kind == EventKind::Mode));
    }

    #[tokio::test]
    async fn test_zero_trade_research_produces_diagnosis() {
        let history: Vec<Bar> = (0..120).map(|i| bar_at(i, 50.0)).collect();
        let (mut orchestrator, _rx) = orchestrator_with(
            trade_spec(RiskParameters::default()),
            history,
            OrchestratorConfig::default(),
        );
        let outcome = orchestrator.run_research("buy the dip").await.unwrap();
        assert!(!outcome.promoted);
        assert_eq!(outcome.report.total_trades, 0);
        assert!(outcome.diagnosis.is_some());
    }

    #[tokio::test]
    async fn test_drift_gate_after_three_consecutive_losses() {
        // Promote, then feed three losing round trips live.
        let history = vec![bar_at(0, 100.0), bar_at(1, 105.0), bar_at(2, 110.0)];
        let (mut orchestrator, mut rx) = orchestrator_with(
            trade_spec(RiskParameters {
                stop_loss: 0.05,
                take_profit: 0.5,
                max_daily_loss: 0.9,
                ..RiskParameters::default()
            }),
            history,
            permissive_config(),
        );
        orchestrator.run_research("go").await.unwrap();
        assert_eq!(orchestrator.mode(), Mode::Trading);
        drain(&mut rx);

        let mut index = 10;
        for _ in 0..3 {
            // Entry at 100, stop-loss exit at 95 on the next bar.
            assert!(orchestrator.on_live_bar(&bar_at(index, 100.0)).is_some());
            index += 1;
            orchestrator.on_live_bar(&bar_at(index, 90.0));
            index += 1;
        }

        assert_eq!(orchestrator.mode(), Mode::Research);
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Drift && e.level == EventLevel::Warn));
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Mode && e.message.contains("RESEARCH")));
    }

    #[tokio::test]
    async fn test_redline_gate_pauses_session() {
        let history = vec![bar_at(0, 100.0), bar_at(1, 105.0), bar_at(2, 110.0)];
        let (mut orchestrator, mut rx) = orchestrator_with(
            trade_spec(RiskParameters {
                stop_loss: 0.5,
                take_profit: 1.0,
                max_daily_loss: 0.03,
                ..RiskParameters::default()
            }),
            history,
            permissive_config(),
        );
        orchestrator.run_research("go").await.unwrap();
        drain(&mut rx);

        // One catastrophic stop-out: the 10% lot loses half its value,
        // about 5% of capital, breaching the 3% redline.
        assert!(orchestrator.on_live_bar(&bar_at(10, 100.0)).is_some());
        orchestrator.on_live_bar(&bar_at(11, 40.0));

        assert_eq!(orchestrator.mode(), Mode::Paused);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| e.kind == EventKind::Redline));

        // PAUSED is terminal: live bars are ignored.
        assert!(orchestrator.on_live_bar(&bar_at(12, 100.0)).is_none());

        // Only an explicit resume returns to RESEARCH.
        orchestrator.resume();
        assert_eq!(orchestrator.mode(), Mode::Research);
        assert_eq!(orchestrator.session_pnl_fraction(), 0.0);
    }

    #[tokio::test]
    async fn test_winning_trade_resets_drift_counter() {
        let history = vec![bar_at(0, 100.0), bar_at(1, 105.0), bar_at(2, 110.0)];
        let (mut orchestrator, _rx) = orchestrator_with(
            trade_spec(RiskParameters {
                stop_loss: 0.05,
                take_profit: 0.08,
                max_daily_loss: 0.9,
                ..RiskParameters::default()
            }),
            history,
            permissive_config(),
        );
        orchestrator.run_research("go").await.unwrap();

        // Two losses, then a win, then two more losses: never three in a row.
        let mut index = 10;
        for _ in 0..2 {
            orchestrator.on_live_bar(&bar_at(index, 100.0));
            index += 1;
            orchestrator.on_live_bar(&bar_at(index, 90.0));
            index += 1;
        }
        orchestrator.on_live_bar(&bar_at(index, 100.0));
        index += 1;
        orchestrator.on_live_bar(&bar_at(index, 120.0)); // take-profit win
        index += 1;
        for _ in 0..2 {
            orchestrator.on_live_bar(&bar_at(index, 100.0));
            index += 1;
            orchestrator.on_live_bar(&bar_at(index, 90.0));
            index += 1;
        }

        assert_eq!(orchestrator.mode(), Mode::Trading);
    }
}
