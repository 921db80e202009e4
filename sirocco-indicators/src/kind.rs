//! Symbolic indicator names.

use std::fmt;

use sirocco_core::error::SpecError;

/// Default RSI period (Wilder).
pub const DEFAULT_RSI_PERIOD: usize = 14;
/// Default Bollinger period.
pub const DEFAULT_BOLLINGER_PERIOD: usize = 20;
/// Default ATR period.
pub const DEFAULT_ATR_PERIOD: usize = 14;
/// Default volume-average period.
pub const DEFAULT_VOLUME_PERIOD: usize = 20;
/// MACD fast EMA period.
pub const MACD_FAST: usize = 12;
/// MACD slow EMA period.
pub const MACD_SLOW: usize = 26;
/// MACD signal EMA period.
pub const MACD_SIGNAL: usize = 9;
/// Bollinger band width in standard deviations.
pub const BOLLINGER_K: f64 = 2.0;

/// An indicator a spec's data requirements may request.
///
/// Parsed from the symbolic names carried in `DataRequirements.indicators`
/// (`"sma_20"`, `"rsi"`, `"macd"`, ...). The original strings are preserved
/// in the spec; this enum is the validated, internal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKind {
    /// Simple moving average over `n` closes.
    Sma(usize),
    /// Exponential moving average over `n` closes.
    Ema(usize),
    /// Relative strength index (Wilder) over `n` deltas.
    Rsi(usize),
    /// MACD line, signal, and histogram (12/26/9).
    Macd,
    /// Bollinger bands over `n` closes, `BOLLINGER_K` standard deviations.
    Bollinger(usize),
    /// Average true range over `n` true ranges.
    Atr(usize),
    /// Volume average and ratio over `n` bars.
    Volume(usize),
}

impl IndicatorKind {
    /// Parses a symbolic indicator name.
    ///
    /// Accepts `sma_N`, `ema_N`, `rsi[_N]`, `macd`, `bollinger[_N]`,
    /// `bb[_N]`, `atr[_N]`, `volume[_N]`, `volume_avg` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `SpecError::UnknownIndicator` for anything else, including a
    /// zero period.
    pub fn parse(name: &str) -> Result<Self, SpecError> {
        let normalized = name.trim().to_ascii_lowercase();
        let unknown = || SpecError::UnknownIndicator(name.to_string());

        let (head, period) = match normalized.rsplit_once('_') {
            Some((head, digits)) if digits.chars().all(|c| c.is_ascii_digit()) => {
                let period: usize = digits.parse().map_err(|_| unknown())?;
                (head, Some(period))
            }
            _ => (normalized.as_str(), None),
        };

        if period == Some(0) {
            return Err(unknown());
        }

        let kind = match (head, period) {
            ("sma", Some(p)) => Self::Sma(p),
            ("ema", Some(p)) => Self::Ema(p),
            ("rsi", p) => Self::Rsi(p.unwrap_or(DEFAULT_RSI_PERIOD)),
            ("macd", None) => Self::Macd,
            ("bollinger" | "bb", p) => Self::Bollinger(p.unwrap_or(DEFAULT_BOLLINGER_PERIOD)),
            ("atr", p) => Self::Atr(p.unwrap_or(DEFAULT_ATR_PERIOD)),
            ("volume" | "volume_avg", p) => Self::Volume(p.unwrap_or(DEFAULT_VOLUME_PERIOD)),
            _ => return Err(unknown()),
        };
        Ok(kind)
    }

    /// Returns the largest lookback period this indicator needs.
    #[must_use]
    pub const fn period(&self) -> usize {
        match self {
            Self::Sma(p) | Self::Ema(p) | Self::Rsi(p) | Self::Bollinger(p) | Self::Atr(p)
            | Self::Volume(p) => *p,
            Self::Macd => MACD_SLOW,
        }
    }

    /// Returns true if the indicator consumes price deltas and therefore
    /// needs one extra bar of warmup beyond its period.
    #[must_use]
    pub const fn requires_delta(&self) -> bool {
        matches!(self, Self::Rsi(_) | Self::Atr(_))
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sma(p) => write!(f, "sma_{p}"),
            Self::Ema(p) => write!(f, "ema_{p}"),
            Self::Rsi(p) => write!(f, "rsi_{p}"),
            Self::Macd => write!(f, "macd"),
            Self::Bollinger(p) => write!(f, "bollinger_{p}"),
            Self::Atr(p) => write!(f, "atr_{p}"),
            Self::Volume(p) => write!(f, "volume_{p}"),
        }
    }
}
