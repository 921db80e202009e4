//! Background strategy refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sirocco_core::event::{EventKind, EventLevel, UiEvent};
use sirocco_engine::SpecStore;
use sirocco_strategy::SpecProducer;

/// Handle to the background refresh task.
///
/// The task re-compiles every loaded ticker's strategy on an interval and
/// atomically replaces specs in the store. It is cancellable between
/// producer invocations; a partially-built spec is never installed.
pub struct RefreshTask {
    handle: JoinHandle<()>,
    is_refreshing: Arc<AtomicBool>,
}

impl RefreshTask {
    pub(crate) fn spawn(
        producer: Arc<dyn SpecProducer>,
        store: SpecStore,
        events: mpsc::UnboundedSender<UiEvent>,
        interval: Duration,
    ) -> Self {
        let is_refreshing = Arc::new(AtomicBool::new(false));
        let guard = is_refreshing.clone();
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a fresh session
            // does not refresh before anything is loaded.
            timer.tick().await;
            loop {
                timer.tick().await;
                run_refresh_cycle(producer.as_ref(), &store, &guard, &events).await;
            }
        });
        Self {
            handle,
            is_refreshing,
        }
    }

    /// Returns true while a refresh cycle is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing.load(Ordering::SeqCst)
    }

    /// Cancels the task.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs one refresh cycle: one producer call per loaded ticker, each result
/// installed atomically. Returns the number of specs replaced.
///
/// The guard makes cycles non-reentrant: a cycle that finds another one in
/// flight returns immediately.
pub async fn run_refresh_cycle(
    producer: &dyn SpecProducer,
    store: &SpecStore,
    guard: &AtomicBool,
    events: &mpsc::UnboundedSender<UiEvent>,
) -> usize {
    if guard.swap(true, Ordering::SeqCst) {
        debug!("refresh already in progress, skipping cycle");
        return 0;
    }

    let mut refreshed = 0;
    for ticker in store.tickers() {
        let Some(loaded) = store.snapshot(&ticker) else {
            continue;
        };
        match producer.compile_strategy(&loaded.spec.source_query).await {
            Ok(spec) if spec.ticker == ticker => match store.install(spec) {
                Ok(()) => {
                    refreshed += 1;
                    let _ = events.send(UiEvent::new(
                        EventLevel::Info,
                        EventKind::System,
                        format!("strategy refreshed for {ticker}"),
                    ));
                }
                Err(err) => {
                    warn!(ticker = %ticker, error = %err, "refreshed spec rejected");
                    let _ = events.send(UiEvent::new(
                        EventLevel::Error,
                        EventKind::System,
                        format!("refreshed spec rejected for {ticker}: {err}"),
                    ));
                }
            },
            Ok(spec) => {
                warn!(
                    ticker = %ticker,
                    produced = %spec.ticker,
                    "producer returned spec for a different ticker, keeping current spec"
                );
            }
            Err(err) => {
                warn!(ticker = %ticker, error = %err, "strategy refresh failed");
                let _ = events.send(UiEvent::new(
                    EventLevel::Error,
                    EventKind::System,
                    format!("strategy refresh failed for {ticker}: {err}"),
                ));
            }
        }
    }

    guard.store(false, Ordering::SeqCst);
    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sirocco_core::error::SiroccoError;
    use sirocco_core::types::{Symbol, Timeframe, Timestamp};
    use sirocco_strategy::{
        DataRequirements, RiskParameters, Signal, SignalAction, StrategySpec,
    };
    use std::sync::atomic::AtomicUsize;

    fn spec_for(ticker: &str) -> StrategySpec {
        StrategySpec {
            id: format!("spec-{ticker}"),
            ticker: Symbol::new(ticker).unwrap(),
            timeframe: Timeframe::Min5,
            data_requirements: DataRequirements {
                indicators: vec![],
                lookback: 10,
                min_data_points: 1,
            },
            signals: vec![Signal {
                id: "probe".to_string(),
                condition: "close > 0".to_string(),
                action: SignalAction::Buy,
                position_size: 0.1,
                confidence: 0.5,
                reasoning: String::new(),
                priority: 1,
            }],
            risk_params: RiskParameters::default(),
            compiled_at: Timestamp::new_unchecked(0),
            expires_at: Timestamp::new_unchecked(i64::MAX),
            source_query: format!("trade {ticker}"),
        }
    }

    struct CountingProducer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpecProducer for CountingProducer {
        async fn compile_strategy(&self, query: &str) -> Result<StrategySpec, SiroccoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Query format is "trade <TICKER>".
            let ticker = query.rsplit(' ').next().unwrap_or("AAPL");
            Ok(spec_for(ticker))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_cycle_replaces_each_loaded_spec() {
        let store = SpecStore::new();
        store.install(spec_for("AAPL")).unwrap();
        store.install(spec_for("MSFT")).unwrap();
        let before_aapl = store
            .snapshot(&Symbol::new("AAPL").unwrap())
            .unwrap()
            .generation;

        let producer = CountingProducer {
            calls: AtomicUsize::new(0),
        };
        let guard = AtomicBool::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let refreshed = run_refresh_cycle(&producer, &store, &guard, &tx).await;
        assert_eq!(refreshed, 2);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
        assert!(!guard.load(Ordering::SeqCst));

        let after_aapl = store
            .snapshot(&Symbol::new("AAPL").unwrap())
            .unwrap()
            .generation;
        assert!(after_aapl > before_aapl);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_cycle_skipped_while_guard_held() {
        let store = SpecStore::new();
        store.install(spec_for("AAPL")).unwrap();

        let producer = CountingProducer {
            calls: AtomicUsize::new(0),
        };
        let guard = AtomicBool::new(true); // a cycle is already in flight
        let (tx, _rx) = mpsc::unbounded_channel();

        let refreshed = run_refresh_cycle(&producer, &store, &guard, &tx).await;
        assert_eq!(refreshed, 0);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 0);
        // The skipping cycle does not clear the other cycle's guard.
        assert!(guard.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cycle_with_empty_store_is_noop() {
        let store = SpecStore::new();
        let producer = CountingProducer {
            calls: AtomicUsize::new(0),
        };
        let guard = AtomicBool::new(false);
        let (tx, _rx) = mpsc::unbounded_channel();

        let refreshed = run_refresh_cycle(&producer, &store, &guard, &tx).await;
        assert_eq!(refreshed, 0);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 0);
    }
}
