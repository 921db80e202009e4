//! # Sirocco CLI
//!
//! Interactive REPL driving the hybrid decision pipeline.
//!
//! Commands:
//! - free text runs the research flow (compile → backtest → gate #1)
//! - `/hybrid <query>` forces the full research → backtest → paper-replay
//!   pipeline (also auto-detected from hybrid-flavored queries)
//! - `/model` switches the spec producer
//! - `exit` / `quit` leaves the REPL

#![warn(clippy::all)]

use std::io::IsTerminal;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::Level;

use sirocco_core::error::SiroccoError;
use sirocco_core::event::UiEvent;
use sirocco_core::types::Symbol;
use sirocco_data::{ChartClient, HistoryProvider, HistoryRange};
use sirocco_orchestrator::{Mode, Orchestrator, OrchestratorConfig};
use sirocco_strategy::{SpecProducer, StrategySpec, TemplateSpecProducer, TemplateStyle};

/// Queries containing any of these run the full hybrid pipeline.
const HYBRID_KEYWORDS: &[&str] = &[
    "backtest",
    "paper",
    "replay",
    "gate",
    "maxdailyloss",
    "consecutive",
    "strategy spec",
];

/// Sirocco - hybrid research/backtest/paper-trading pipeline
#[derive(Parser)]
#[command(name = "sirocco")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Default ticker when the query names none
    #[arg(short, long, default_value = "SPY")]
    ticker: String,
}

/// Producer whose template style can be switched at runtime (`/model`).
struct SwitchableProducer {
    style: RwLock<TemplateStyle>,
    default_ticker: Symbol,
}

impl SwitchableProducer {
    fn new(default_ticker: Symbol) -> Self {
        Self {
            style: RwLock::new(TemplateStyle::MeanReversion),
            default_ticker,
        }
    }

    fn toggle(&self) -> TemplateStyle {
        let mut style = self.style.write().expect("style lock poisoned");
        *style = match *style {
            TemplateStyle::MeanReversion => TemplateStyle::Momentum,
            TemplateStyle::Momentum => TemplateStyle::MeanReversion,
        };
        *style
    }
}

#[async_trait]
impl SpecProducer for SwitchableProducer {
    async fn compile_strategy(&self, query: &str) -> Result<StrategySpec, SiroccoError> {
        let style = *self.style.read().expect("style lock poisoned");
        TemplateSpecProducer::new(style, self.default_ticker.clone())
            .compile_strategy(query)
            .await
    }

    fn name(&self) -> &str {
        match *self.style.read().expect("style lock poisoned") {
            TemplateStyle::MeanReversion => "mean-reversion",
            TemplateStyle::Momentum => "momentum",
        }
    }
}

fn wants_hybrid(query: &str) -> bool {
    let normalized = query.to_ascii_lowercase();
    HYBRID_KEYWORDS.iter().any(|k| normalized.contains(k))
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn print_events(events: &mut tokio::sync::mpsc::UnboundedReceiver<UiEvent>) {
    while let Ok(event) = events.try_recv() {
        println!("  {event}");
    }
}

async fn run_research_flow(
    orchestrator: &mut Orchestrator,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<UiEvent>,
    query: &str,
) -> Option<Symbol> {
    let promoted = match orchestrator.run_research(query).await {
        Ok(outcome) => {
            println!(
                "spec {} on {}: {} trades, return {:.2}%, drawdown {:.2}%, sharpe {:.2}",
                outcome.spec_id,
                outcome.ticker,
                outcome.report.total_trades,
                outcome.report.total_return_pct,
                outcome.report.max_drawdown_pct,
                outcome.report.sharpe_ratio,
            );
            if let Some(diagnosis) = &outcome.diagnosis {
                println!("diagnosis: {} - {}", diagnosis.kind, diagnosis.detail);
                for suggestion in &diagnosis.suggestions {
                    println!("  - {suggestion}");
                }
            }
            outcome.promoted.then_some(outcome.ticker)
        }
        Err(err) => {
            println!("research failed: {err}");
            None
        }
    };
    print_events(events);
    promoted
}

async fn run_hybrid_flow(
    orchestrator: &mut Orchestrator,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<UiEvent>,
    history: &dyn HistoryProvider,
    query: &str,
) {
    let Some(ticker) = run_research_flow(orchestrator, events, query).await else {
        println!("not promoted to trading; hybrid replay skipped");
        return;
    };

    // Paper-trade a recent slice as a stand-in for a live feed.
    println!("replaying recent bars through the paper session...");
    match history
        .fetch(
            &ticker,
            sirocco_core::types::Timeframe::Min5,
            HistoryRange::Month1,
        )
        .await
    {
        Ok(bars) => {
            let mut decisions = 0_usize;
            for bar in &bars {
                if orchestrator.on_live_bar(bar).is_some() {
                    decisions += 1;
                }
                if orchestrator.mode() != Mode::Trading {
                    break;
                }
            }
            println!(
                "{ticker}: {decisions} decisions over {} bars, session pnl {:.2}%, mode {}",
                bars.len(),
                orchestrator.session_pnl_fraction() * 100.0,
                orchestrator.mode()
            );
        }
        Err(err) => println!("{ticker}: replay fetch failed: {err}"),
    }
    print_events(events);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if !std::io::stdin().is_terminal() {
        eprintln!("sirocco: interactive terminal required");
        std::process::exit(2);
    }

    let default_ticker = Symbol::new(&cli.ticker)
        .map_err(|e| anyhow::anyhow!("invalid default ticker: {e}"))?;
    let producer = Arc::new(SwitchableProducer::new(default_ticker));
    let history: Arc<dyn HistoryProvider> = Arc::new(
        ChartClient::new().map_err(|e| anyhow::anyhow!("http client: {e}"))?,
    );

    let (mut orchestrator, mut events) = Orchestrator::new(
        OrchestratorConfig::default(),
        producer.clone(),
        history.clone(),
    );
    let refresh = orchestrator.spawn_refresh();

    println!("sirocco - hybrid decision pipeline");
    println!("free text researches a strategy; /hybrid <query> adds a paper replay;");
    println!("/model switches the producer; exit quits.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input == "/model" {
            let style = producer.toggle();
            println!("producer switched to {}", style.as_str());
            continue;
        }
        if let Some(query) = input.strip_prefix("/hybrid") {
            let query = query.trim();
            if query.is_empty() {
                println!("usage: /hybrid <query>");
                continue;
            }
            run_hybrid_flow(&mut orchestrator, &mut events, history.as_ref(), query).await;
            continue;
        }
        if wants_hybrid(input) {
            run_hybrid_flow(&mut orchestrator, &mut events, history.as_ref(), input).await;
        } else {
            run_research_flow(&mut orchestrator, &mut events, input).await;
        }
    }

    refresh.abort();
    println!("bye");
    Ok(())
}
