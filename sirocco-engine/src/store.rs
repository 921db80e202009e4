//! Read-mostly spec store with copy-on-write replacement.
//!
//! One writer (the orchestrator's refresh task) installs `Arc<LoadedSpec>`
//! values; the fast path takes one `Arc` snapshot per bar, so a bar is
//! always evaluated against exactly one spec version.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::info;

use sirocco_core::error::SiroccoError;
use sirocco_core::types::Symbol;
use sirocco_indicators::IndicatorKind;
use sirocco_strategy::condition::CompiledCondition;
use sirocco_strategy::{Signal, StrategySpec};

/// How many consecutive runtime errors disable a signal.
const DISABLE_AFTER: u32 = 3;

/// A signal with its compiled predicate and runtime health counters.
///
/// The counters are atomics because the fast path mutates them through the
/// shared `Arc<LoadedSpec>` snapshot.
#[derive(Debug)]
pub struct CompiledSignal {
    /// The declarative signal.
    pub signal: Signal,
    /// The compiled, sandboxed predicate.
    pub predicate: CompiledCondition,
    consecutive_errors: AtomicU32,
    disabled: AtomicBool,
}

impl CompiledSignal {
    fn new(signal: Signal, predicate: CompiledCondition) -> Self {
        Self {
            signal,
            predicate,
            consecutive_errors: AtomicU32::new(0),
            disabled: AtomicBool::new(false),
        }
    }

    /// Returns true if the signal has been disabled for this spec's life.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Records a successful evaluation, resetting the error streak.
    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    /// Records a runtime error; returns true if this one disabled the signal.
    pub fn record_error(&self) -> bool {
        let streak = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if streak >= DISABLE_AFTER && !self.disabled.swap(true, Ordering::Relaxed) {
            return true;
        }
        false
    }
}

/// A validated spec with compiled signals, ready for the fast path.
#[derive(Debug)]
pub struct LoadedSpec {
    /// The validated spec.
    pub spec: StrategySpec,
    /// Parsed indicator requirements, sorted and deduplicated.
    pub requested: Vec<IndicatorKind>,
    /// Signals in descending priority order.
    pub signals: Vec<CompiledSignal>,
    /// Monotonic install generation, used to detect replacement.
    pub generation: u64,
}

/// The per-ticker spec map shared between the orchestrator (writer) and the
/// execution engine (reader).
#[derive(Debug, Clone, Default)]
pub struct SpecStore {
    inner: Arc<RwLock<HashMap<Symbol, Arc<LoadedSpec>>>>,
    generation: Arc<AtomicU64>,
}

impl SpecStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates, compiles, and atomically installs a spec, replacing any
    /// prior spec for the same ticker.
    ///
    /// # Errors
    ///
    /// Returns `SpecError`/`ConditionError` (as `SiroccoError`) when the
    /// spec fails validation or a condition fails to compile; nothing is
    /// installed in that case.
    pub fn install(&self, spec: StrategySpec) -> Result<(), SiroccoError> {
        spec.validate().map_err(SiroccoError::from)?;

        let requested = spec.data_requirements.parsed_indicators()?;

        let mut signals = Vec::with_capacity(spec.signals.len());
        for signal in &spec.signals {
            // validate() already compiled each condition; compiling again
            // here caches the predicate alongside the signal.
            let predicate = CompiledCondition::compile(&signal.condition)
                .map_err(SiroccoError::from)?;
            signals.push(CompiledSignal::new(signal.clone(), predicate));
        }
        signals.sort_by(|a, b| b.signal.priority.cmp(&a.signal.priority));

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let loaded = Arc::new(LoadedSpec {
            requested,
            signals,
            generation,
            spec,
        });

        let ticker = loaded.spec.ticker.clone();
        info!(ticker = %ticker, spec_id = %loaded.spec.id, generation, "spec installed");
        self.inner.write().insert(ticker, loaded);
        Ok(())
    }

    /// Removes the spec for a ticker, returning it if present.
    pub fn remove(&self, ticker: &Symbol) -> Option<Arc<LoadedSpec>> {
        self.inner.write().remove(ticker)
    }

    /// Takes a consistent snapshot of the spec for a ticker.
    #[must_use]
    pub fn snapshot(&self, ticker: &Symbol) -> Option<Arc<LoadedSpec>> {
        self.inner.read().get(ticker).cloned()
    }

    /// Returns the tickers with an installed spec.
    #[must_use]
    pub fn tickers(&self) -> Vec<Symbol> {
        self.inner.read().keys().cloned().collect()
    }

    /// Returns the number of installed specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if no spec is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
