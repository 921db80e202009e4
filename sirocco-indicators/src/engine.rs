//! Per-ticker indicator engine.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use sirocco_core::data::{Bar, EnrichedBar};
use sirocco_core::error::DataError;
use sirocco_core::types::Symbol;

use crate::kind::{BOLLINGER_K, IndicatorKind, MACD_FAST, MACD_SIGNAL, MACD_SLOW};
use crate::state::{AtrState, EmaState, MacdState, RsiState, SmaState};

/// Incremental indicator engine.
///
/// Owns all per-ticker indicator state: a bounded ring of recent bars plus
/// one accumulator per requested indicator. State is mutated only by
/// [`IndicatorEngine::enrich`] and destroyed by [`IndicatorEngine::reset`]
/// (or when the requested indicator set changes for a ticker).
///
/// # Examples
///
/// ```
/// use sirocco_core::data::Bar;
/// use sirocco_core::types::{Symbol, Timestamp};
/// use sirocco_indicators::{IndicatorEngine, IndicatorKind};
///
/// let mut engine = IndicatorEngine::new();
/// let ticker = Symbol::new("AAPL").unwrap();
/// let requested = vec![IndicatorKind::Sma(20)];
/// for i in 0..25 {
///     let bar = Bar::new(
///         ticker.clone(),
///         Timestamp::new_unchecked(i * 60_000),
///         100.0,
///         101.0,
///         99.0,
///         100.0,
///         1_000.0,
///     )
///     .unwrap();
///     let enriched = engine.enrich(&bar, &requested, 20).unwrap();
///     if i >= 19 {
///         assert!(enriched.sma_20.is_some());
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct IndicatorEngine {
    states: HashMap<Symbol, TickerState>,
}

impl IndicatorEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bar to the ticker's ring and returns the enriched bar.
    ///
    /// Fields for each requested indicator are populated once sufficient
    /// history exists, and left absent otherwise. If the requested indicator
    /// set or lookback changed since the previous call for this ticker, the
    /// ticker's state is rebuilt from scratch.
    ///
    /// # Errors
    ///
    /// Returns `DataError::InvalidBar` on a non-finite input bar; state is
    /// not mutated in that case.
    pub fn enrich(
        &mut self,
        bar: &Bar,
        requested: &[IndicatorKind],
        lookback: usize,
    ) -> Result<EnrichedBar, DataError> {
        if !bar_is_finite(bar) {
            warn!(ticker = %bar.ticker, timestamp = %bar.timestamp, "dropping non-finite bar");
            return Err(DataError::InvalidBar {
                reason: "non-finite bar field".to_string(),
            });
        }

        let mut wanted: Vec<IndicatorKind> = requested.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let needs_rebuild = match self.states.get(&bar.ticker) {
            Some(state) => state.requested != wanted || state.lookback != lookback,
            None => true,
        };
        if needs_rebuild {
            if self.states.contains_key(&bar.ticker) {
                debug!(ticker = %bar.ticker, "indicator requirements changed, rebuilding state");
            }
            self.states
                .insert(bar.ticker.clone(), TickerState::new(wanted, lookback));
        }
        let state = self
            .states
            .get_mut(&bar.ticker)
            .expect("ticker state ensured above");

        Ok(state.update(bar))
    }

    /// Returns the number of bars currently held for a ticker.
    #[must_use]
    pub fn history_len(&self, ticker: &Symbol) -> usize {
        self.states.get(ticker).map_or(0, |s| s.ring.len())
    }

    /// Clears all state for one ticker.
    pub fn reset(&mut self, ticker: &Symbol) {
        self.states.remove(ticker);
    }

    /// Clears all state for every ticker.
    pub fn reset_all(&mut self) {
        self.states.clear();
    }
}

fn bar_is_finite(bar: &Bar) -> bool {
    bar.open.is_finite()
        && bar.high.is_finite()
        && bar.low.is_finite()
        && bar.close.is_finite()
        && bar.volume.is_finite()
}

/// All indicator state for one ticker.
#[derive(Debug)]
struct TickerState {
    requested: Vec<IndicatorKind>,
    lookback: usize,
    capacity: usize,
    ring: VecDeque<Bar>,
    sma: Vec<(usize, SmaState)>,
    ema: Vec<(usize, EmaState)>,
    rsi: Option<RsiState>,
    macd: Option<MacdState>,
    bollinger: Option<BollingerState>,
    atr: Option<AtrState>,
    volume: Option<SmaState>,
}

#[derive(Debug)]
struct BollingerState {
    period: usize,
    closes: VecDeque<f64>,
}

impl TickerState {
    fn new(requested: Vec<IndicatorKind>, lookback: usize) -> Self {
        let max_period = requested
            .iter()
            .map(IndicatorKind::period)
            .max()
            .unwrap_or(0);
        let capacity = lookback.max(max_period).max(1) * 2;

        let mut state = Self {
            requested: requested.clone(),
            lookback,
            capacity,
            ring: VecDeque::with_capacity(capacity + 1),
            sma: Vec::new(),
            ema: Vec::new(),
            rsi: None,
            macd: None,
            bollinger: None,
            atr: None,
            volume: None,
        };

        for kind in &requested {
            match *kind {
                IndicatorKind::Sma(p) => state.sma.push((p, SmaState::new(p))),
                IndicatorKind::Ema(p) => state.ema.push((p, EmaState::new(p))),
                IndicatorKind::Rsi(p) => state.rsi = Some(RsiState::new(p)),
                IndicatorKind::Macd => {
                    state.macd = Some(MacdState::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL));
                }
                IndicatorKind::Bollinger(p) => {
                    state.bollinger = Some(BollingerState {
                        period: p,
                        closes: VecDeque::with_capacity(p + 1),
                    });
                }
                IndicatorKind::Atr(p) => state.atr = Some(AtrState::new(p)),
                IndicatorKind::Volume(p) => state.volume = Some(SmaState::new(p)),
            }
        }
        state
    }

    #[allow(clippy::cast_precision_loss)]
    fn update(&mut self, bar: &Bar) -> EnrichedBar {
        self.ring.push_back(bar.clone());
        if self.ring.len() > self.capacity {
            self.ring.pop_front();
        }

        let mut enriched = EnrichedBar::from_bar(bar.clone());

        for (period, sma) in &mut self.sma {
            let value = sma.update(bar.close);
            match *period {
                20 => enriched.sma_20 = value,
                50 => enriched.sma_50 = value,
                200 => enriched.sma_200 = value,
                _ => {}
            }
        }

        for (period, ema) in &mut self.ema {
            let value = ema.update(bar.close);
            match *period {
                12 => enriched.ema_12 = value,
                26 => enriched.ema_26 = value,
                _ => {}
            }
        }

        if let Some(rsi) = &mut self.rsi {
            enriched.rsi = rsi.update(bar.close);
        }

        if let Some(macd) = &mut self.macd {
            let out = macd.update(bar.close);
            enriched.macd = out.macd;
            enriched.macd_signal = out.signal;
            enriched.macd_histogram = out.histogram;
        }

        if let Some(bollinger) = &mut self.bollinger {
            bollinger.closes.push_back(bar.close);
            if bollinger.closes.len() > bollinger.period {
                bollinger.closes.pop_front();
            }
            if bollinger.closes.len() == bollinger.period {
                let n = bollinger.period as f64;
                let mean: f64 = bollinger.closes.iter().sum::<f64>() / n;
                let variance: f64 = bollinger
                    .closes
                    .iter()
                    .map(|c| {
                        let d = c - mean;
                        d * d
                    })
                    .sum::<f64>()
                    / n;
                let std = variance.sqrt();
                enriched.bb_middle = Some(mean);
                enriched.bb_upper = Some(mean + BOLLINGER_K * std);
                enriched.bb_lower = Some(mean - BOLLINGER_K * std);
            }
        }

        if let Some(atr) = &mut self.atr {
            enriched.atr = atr.update(bar);
        }

        if let Some(volume) = &mut self.volume {
            let avg = volume.update(bar.volume);
            enriched.volume_avg = avg;
            enriched.volume_ratio = match avg {
                Some(avg) if avg > 0.0 => Some(bar.volume / avg),
                _ => None,
            };
        }

        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirocco_core::types::Timestamp;

    const EPS: f64 = 1e-9;

    fn ticker() -> Symbol {
        Symbol::new("TEST").unwrap()
    }

    fn bar(i: i64, close: f64) -> Bar {
        let open = close - 0.5;
        Bar::new(
            ticker(),
            Timestamp::new_unchecked(i * 60_000),
            open,
            close.max(open) + 1.0,
            close.min(open) - 1.0,
            close,
            1_000.0 + f64::from(i as i32),
        )
        .unwrap()
    }

    fn bar_with_volume(i: i64, close: f64, volume: f64) -> Bar {
        Bar::new(
            ticker(),
            Timestamp::new_unchecked(i * 60_000),
            close,
            close + 1.0,
            close - 1.0,
            close,
            volume,
        )
        .unwrap()
    }

    #[test]
    fn test_enrich_absent_until_warm() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Sma(20), IndicatorKind::Rsi(14)];
        for i in 0..19 {
            let enriched = engine.enrich(&bar(i, 100.0 + f64::from(i as i32)), &requested, 40).unwrap();
            assert_eq!(enriched.sma_20, None, "bar {i}");
        }
        let enriched = engine.enrich(&bar(19, 119.0), &requested, 40).unwrap();
        assert!(enriched.sma_20.is_some());
    }

    #[test]
    fn test_enrich_only_requested_fields() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Sma(20)];
        let mut enriched = None;
        for i in 0..30 {
            enriched = Some(engine.enrich(&bar(i, 100.0), &requested, 40).unwrap());
        }
        let enriched = enriched.unwrap();
        assert!(enriched.sma_20.is_some());
        assert_eq!(enriched.rsi, None);
        assert_eq!(enriched.macd, None);
        assert_eq!(enriched.atr, None);
    }

    #[test]
    fn test_ring_bounded_by_twice_lookback() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Sma(20)];
        for i in 0..200 {
            engine.enrich(&bar(i, 100.0), &requested, 30).unwrap();
        }
        assert_eq!(engine.history_len(&ticker()), 60);
    }

    #[test]
    fn test_requirements_change_rebuilds_state() {
        let mut engine = IndicatorEngine::new();
        for i in 0..30 {
            engine
                .enrich(&bar(i, 100.0), &[IndicatorKind::Sma(20)], 40)
                .unwrap();
        }
        assert_eq!(engine.history_len(&ticker()), 30);

        // Same requirements keep history.
        engine
            .enrich(&bar(30, 100.0), &[IndicatorKind::Sma(20)], 40)
            .unwrap();
        assert_eq!(engine.history_len(&ticker()), 31);

        // Different requirements rebuild from scratch.
        engine
            .enrich(&bar(31, 100.0), &[IndicatorKind::Sma(50)], 60)
            .unwrap();
        assert_eq!(engine.history_len(&ticker()), 1);
    }

    #[test]
    fn test_reset_clears_ticker() {
        let mut engine = IndicatorEngine::new();
        for i in 0..10 {
            engine
                .enrich(&bar(i, 100.0), &[IndicatorKind::Sma(5)], 10)
                .unwrap();
        }
        engine.reset(&ticker());
        assert_eq!(engine.history_len(&ticker()), 0);
    }

    #[test]
    fn test_bollinger_zero_std_collapses_bands() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Bollinger(20)];
        let mut enriched = None;
        for i in 0..25 {
            enriched = Some(engine.enrich(&bar_with_volume(i, 50.0, 1_000.0), &requested, 40).unwrap());
        }
        let enriched = enriched.unwrap();
        let middle = enriched.bb_middle.unwrap();
        assert!((middle - 50.0).abs() < EPS);
        assert!((enriched.bb_upper.unwrap() - middle).abs() < EPS);
        assert!((enriched.bb_lower.unwrap() - middle).abs() < EPS);
    }

    #[test]
    fn test_bollinger_bands_bracket_middle() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Bollinger(20)];
        let mut enriched = None;
        for i in 0..40 {
            let close = 100.0 + (f64::from(i as i32) * 0.9).sin() * 4.0;
            enriched = Some(engine.enrich(&bar_with_volume(i, close, 1_000.0), &requested, 40).unwrap());
        }
        let enriched = enriched.unwrap();
        let (upper, middle, lower) = (
            enriched.bb_upper.unwrap(),
            enriched.bb_middle.unwrap(),
            enriched.bb_lower.unwrap(),
        );
        assert!(upper > middle && middle > lower);
        assert!((upper - middle - (middle - lower)).abs() < EPS);
    }

    #[test]
    fn test_volume_ratio() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Volume(4)];
        for i in 0..4 {
            engine
                .enrich(&bar_with_volume(i, 100.0, 1_000.0), &requested, 10)
                .unwrap();
        }
        // Average of [1000, 1000, 1000, 3000] = 1500; ratio = 2.
        let enriched = engine
            .enrich(&bar_with_volume(4, 100.0, 3_000.0), &requested, 10)
            .unwrap();
        assert!((enriched.volume_avg.unwrap() - 1_500.0).abs() < EPS);
        assert!((enriched.volume_ratio.unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_zero_volume_ratio_absent() {
        let mut engine = IndicatorEngine::new();
        let requested = vec![IndicatorKind::Volume(2)];
        engine
            .enrich(&bar_with_volume(0, 100.0, 0.0), &requested, 10)
            .unwrap();
        let enriched = engine
            .enrich(&bar_with_volume(1, 100.0, 0.0), &requested, 10)
            .unwrap();
        assert_eq!(enriched.volume_avg, Some(0.0));
        assert_eq!(enriched.volume_ratio, None);
    }

    #[test]
    fn test_independent_tickers() {
        let mut engine = IndicatorEngine::new();
        let other = Symbol::new("OTHER").unwrap();
        let requested = vec![IndicatorKind::Sma(5)];
        for i in 0..10 {
            engine.enrich(&bar(i, 100.0), &requested, 10).unwrap();
        }
        let mut other_bar = bar(0, 100.0);
        other_bar.ticker = other.clone();
        engine.enrich(&other_bar, &requested, 10).unwrap();
        assert_eq!(engine.history_len(&ticker()), 10);
        assert_eq!(engine.history_len(&other), 1);
    }
}
