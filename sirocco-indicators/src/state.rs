//! Streaming accumulators.
//!
//! Each accumulator consumes one value per bar and yields the indicator value
//! once warmed up, in O(1) amortized time. Seeding follows the conventional
//! definitions: EMA seeds with the SMA of its first `period` inputs, RSI uses
//! Wilder smoothing seeded over the first `period` deltas.

use std::collections::VecDeque;

use sirocco_core::data::Bar;

/// Running simple moving average over a fixed window.
#[derive(Debug, Clone)]
pub struct SmaState {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl SmaState {
    /// Creates a new SMA accumulator.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }

    /// Consumes one value; returns the average once `period` values are held.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    /// Returns the number of values currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns true if no values have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Exponential moving average seeded with the SMA of its first `period`
/// inputs, then updated as `ema' = (value - ema) * alpha + ema` with
/// `alpha = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct EmaState {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl EmaState {
    /// Creates a new EMA accumulator.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(period: usize) -> Self {
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    /// Consumes one value; returns the EMA once seeded.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, value: f64) -> Option<f64> {
        match self.value {
            Some(ema) => {
                let next = (value - ema) * self.alpha + ema;
                self.value = Some(next);
            }
            None => {
                self.seed_sum += value;
                self.seed_count += 1;
                if self.seed_count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

/// Wilder RSI.
///
/// Seed: average gain/loss over the first `period` deltas. Update:
/// `avg' = (avg * (period - 1) + x) / period`. A seeded flat series
/// (both averages zero) reads 50; `avg_loss == 0` reads 100.
#[derive(Debug, Clone)]
pub struct RsiState {
    period: usize,
    prev_close: Option<f64>,
    seed_gain: f64,
    seed_loss: f64,
    seed_count: usize,
    avg_gain: f64,
    avg_loss: f64,
    seeded: bool,
}

impl RsiState {
    /// Creates a new RSI accumulator.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seed_gain: 0.0,
            seed_loss: 0.0,
            seed_count: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            seeded: false,
        }
    }

    /// Consumes one close; returns the RSI once `period + 1` closes are seen.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = match self.prev_close.replace(close) {
            Some(prev) => prev,
            None => return None,
        };
        let delta = close - prev;
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };

        if self.seeded {
            let p = self.period as f64;
            self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
            self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
            return Some(self.value());
        }

        self.seed_gain += gain;
        self.seed_loss += loss;
        self.seed_count += 1;
        if self.seed_count == self.period {
            let p = self.period as f64;
            self.avg_gain = self.seed_gain / p;
            self.avg_loss = self.seed_loss / p;
            self.seeded = true;
            return Some(self.value());
        }
        None
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 && self.avg_gain == 0.0 {
            return 50.0;
        }
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// MACD line, signal, and histogram.
///
/// Line = EMA(12) - EMA(26). The signal is a true EMA(9) maintained over the
/// MACD stream with its own seed; the histogram is line - signal.
#[derive(Debug, Clone)]
pub struct MacdState {
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
}

/// One MACD observation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdOutput {
    /// MACD line, present once the slow EMA is seeded.
    pub macd: Option<f64>,
    /// Signal line, present once the signal EMA over the MACD stream is seeded.
    pub signal: Option<f64>,
    /// Histogram (line - signal), present with the signal.
    pub histogram: Option<f64>,
}

impl MacdState {
    /// Creates a new MACD accumulator with the given periods.
    #[must_use]
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
        }
    }

    /// Consumes one close.
    pub fn update(&mut self, close: f64) -> MacdOutput {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return MacdOutput::default();
        };
        let macd = fast - slow;
        let signal = self.signal.update(macd);
        MacdOutput {
            macd: Some(macd),
            signal,
            histogram: signal.map(|s| macd - s),
        }
    }
}

/// Average true range: arithmetic mean of the last `period` true ranges.
///
/// The first bar's true range is `high - low`; later bars use
/// `max(high - low, |high - prev_close|, |low - prev_close|)`.
#[derive(Debug, Clone)]
pub struct AtrState {
    prev_close: Option<f64>,
    ranges: SmaState,
}

impl AtrState {
    /// Creates a new ATR accumulator.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            ranges: SmaState::new(period),
        }
    }

    /// Consumes one bar; returns the ATR once `period` true ranges are held.
    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let tr = match self.prev_close {
            Some(prev) => (bar.high - bar.low)
                .max((bar.high - prev).abs())
                .max((bar.low - prev).abs()),
            None => bar.high - bar.low,
        };
        self.prev_close = Some(bar.close);
        self.ranges.update(tr)
    }
}
