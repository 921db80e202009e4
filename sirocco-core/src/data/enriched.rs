//! Enriched bar: a bar augmented with computed indicator values.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Bar;

/// The closed set of fields a condition expression may reference.
///
/// Identifiers in condition strings resolve to this enum at compile time,
/// which structurally guarantees that a compiled predicate can only read
/// `EnrichedBar` data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Bar open price.
    Open,
    /// Bar high price.
    High,
    /// Bar low price.
    Low,
    /// Bar close price.
    Close,
    /// Alias for the close price.
    Price,
    /// Bar volume.
    Volume,
    /// Bar timestamp in Unix milliseconds.
    Timestamp,
    /// Ticker identifier (non-numeric; comparisons over it never hold).
    Ticker,
    /// Simple moving average, 20 bars.
    Sma20,
    /// Simple moving average, 50 bars.
    Sma50,
    /// Simple moving average, 200 bars.
    Sma200,
    /// Exponential moving average, 12 bars.
    Ema12,
    /// Exponential moving average, 26 bars.
    Ema26,
    /// Relative strength index (Wilder, 14 bars).
    Rsi,
    /// MACD line (EMA12 - EMA26).
    Macd,
    /// MACD signal line (EMA9 over the MACD stream).
    MacdSignal,
    /// MACD histogram (macd - signal).
    MacdHistogram,
    /// Bollinger upper band.
    BbUpper,
    /// Bollinger middle band (SMA20).
    BbMiddle,
    /// Bollinger lower band.
    BbLower,
    /// Average true range.
    Atr,
    /// Average volume, 20 bars.
    VolumeAvg,
    /// Volume relative to its average.
    VolumeRatio,
}

impl Field {
    /// Resolves a normalized identifier to a field.
    ///
    /// Matching is case-insensitive; callers strip any `data.` prefix before
    /// resolution. Returns `None` for identifiers outside the closed set.
    #[must_use]
    pub fn resolve(ident: &str) -> Option<Self> {
        let normalized = ident.to_ascii_lowercase();
        let field = match normalized.as_str() {
            "open" => Self::Open,
            "high" => Self::High,
            "low" => Self::Low,
            "close" => Self::Close,
            "price" => Self::Price,
            "volume" => Self::Volume,
            "timestamp" => Self::Timestamp,
            "ticker" => Self::Ticker,
            "sma_20" => Self::Sma20,
            "sma_50" => Self::Sma50,
            "sma_200" => Self::Sma200,
            "ema_12" => Self::Ema12,
            "ema_26" => Self::Ema26,
            "rsi" | "rsi_14" => Self::Rsi,
            "macd" => Self::Macd,
            "macd_signal" => Self::MacdSignal,
            "macd_histogram" => Self::MacdHistogram,
            "bb_upper" => Self::BbUpper,
            "bb_middle" => Self::BbMiddle,
            "bb_lower" => Self::BbLower,
            "atr" | "atr_14" => Self::Atr,
            "volume_avg" => Self::VolumeAvg,
            "volume_ratio" => Self::VolumeRatio,
            _ => return None,
        };
        Some(field)
    }

    /// Returns the canonical identifier for this field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Price => "price",
            Self::Volume => "volume",
            Self::Timestamp => "timestamp",
            Self::Ticker => "ticker",
            Self::Sma20 => "sma_20",
            Self::Sma50 => "sma_50",
            Self::Sma200 => "sma_200",
            Self::Ema12 => "ema_12",
            Self::Ema26 => "ema_26",
            Self::Rsi => "rsi",
            Self::Macd => "macd",
            Self::MacdSignal => "macd_signal",
            Self::MacdHistogram => "macd_histogram",
            Self::BbUpper => "bb_upper",
            Self::BbMiddle => "bb_middle",
            Self::BbLower => "bb_lower",
            Self::Atr => "atr",
            Self::VolumeAvg => "volume_avg",
            Self::VolumeRatio => "volume_ratio",
        }
    }

    /// Returns true if the field is an indicator (not a raw bar field).
    #[must_use]
    pub const fn is_indicator(&self) -> bool {
        !matches!(
            self,
            Self::Open
                | Self::High
                | Self::Low
                | Self::Close
                | Self::Price
                | Self::Volume
                | Self::Timestamp
                | Self::Ticker
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bar augmented with indicator values computed up to and including it.
///
/// Indicator fields are `None` when insufficient history exists, never a
/// sentinel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    /// The underlying bar.
    #[serde(flatten)]
    pub bar: Bar,
    /// Simple moving average, 20 bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_20: Option<f64>,
    /// Simple moving average, 50 bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_50: Option<f64>,
    /// Simple moving average, 200 bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_200: Option<f64>,
    /// Exponential moving average, 12 bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_12: Option<f64>,
    /// Exponential moving average, 26 bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_26: Option<f64>,
    /// Relative strength index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    /// MACD line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<f64>,
    /// MACD signal line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_signal: Option<f64>,
    /// MACD histogram.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_histogram: Option<f64>,
    /// Bollinger upper band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_upper: Option<f64>,
    /// Bollinger middle band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_middle: Option<f64>,
    /// Bollinger lower band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_lower: Option<f64>,
    /// Average true range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
    /// Average volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_avg: Option<f64>,
    /// Volume relative to its average.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,
}

impl EnrichedBar {
    /// Creates an enriched bar with every indicator field absent.
    #[must_use]
    pub fn from_bar(bar: Bar) -> Self {
        Self {
            bar,
            sma_20: None,
            sma_50: None,
            sma_200: None,
            ema_12: None,
            ema_26: None,
            rsi: None,
            macd: None,
            macd_signal: None,
            macd_histogram: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
            atr: None,
            volume_avg: None,
            volume_ratio: None,
        }
    }

    /// Returns the numeric value of a field, or `None` if it is absent or
    /// non-numeric (the ticker).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn field(&self, field: Field) -> Option<f64> {
        match field {
            Field::Open => Some(self.bar.open),
            Field::High => Some(self.bar.high),
            Field::Low => Some(self.bar.low),
            Field::Close | Field::Price => Some(self.bar.close),
            Field::Volume => Some(self.bar.volume),
            Field::Timestamp => Some(self.bar.timestamp.as_millis() as f64),
            Field::Ticker => None,
            Field::Sma20 => self.sma_20,
            Field::Sma50 => self.sma_50,
            Field::Sma200 => self.sma_200,
            Field::Ema12 => self.ema_12,
            Field::Ema26 => self.ema_26,
            Field::Rsi => self.rsi,
            Field::Macd => self.macd,
            Field::MacdSignal => self.macd_signal,
            Field::MacdHistogram => self.macd_histogram,
            Field::BbUpper => self.bb_upper,
            Field::BbMiddle => self.bb_middle,
            Field::BbLower => self.bb_lower,
            Field::Atr => self.atr,
            Field::VolumeAvg => self.volume_avg,
            Field::VolumeRatio => self.volume_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Symbol, Timestamp};

    fn bar() -> Bar {
        Bar::new(
            Symbol::new("AAPL").unwrap(),
            Timestamp::new_unchecked(1000),
            10.0,
            12.0,
            9.0,
            11.0,
            500.0,
        )
        .unwrap()
    }

    #[test]
    fn test_field_resolve_bar_fields() {
        assert_eq!(Field::resolve("close"), Some(Field::Close));
        assert_eq!(Field::resolve("PRICE"), Some(Field::Price));
        assert_eq!(Field::resolve("volume"), Some(Field::Volume));
    }

    #[test]
    fn test_field_resolve_indicators() {
        assert_eq!(Field::resolve("SMA_20"), Some(Field::Sma20));
        assert_eq!(Field::resolve("rsi"), Some(Field::Rsi));
        assert_eq!(Field::resolve("rsi_14"), Some(Field::Rsi));
        assert_eq!(Field::resolve("MACD_signal"), Some(Field::MacdSignal));
        assert_eq!(Field::resolve("bb_lower"), Some(Field::BbLower));
    }

    #[test]
    fn test_field_resolve_unknown() {
        assert_eq!(Field::resolve("process"), None);
        assert_eq!(Field::resolve("sma_21"), None);
        assert_eq!(Field::resolve(""), None);
    }

    #[test]
    fn test_field_is_indicator() {
        assert!(Field::Rsi.is_indicator());
        assert!(!Field::Close.is_indicator());
        assert!(!Field::Ticker.is_indicator());
    }

    #[test]
    fn test_enriched_bar_absent_fields() {
        let enriched = EnrichedBar::from_bar(bar());
        assert_eq!(enriched.field(Field::Close), Some(11.0));
        assert_eq!(enriched.field(Field::Price), Some(11.0));
        assert_eq!(enriched.field(Field::Rsi), None);
        assert_eq!(enriched.field(Field::Ticker), None);
    }

    #[test]
    fn test_enriched_bar_present_fields() {
        let mut enriched = EnrichedBar::from_bar(bar());
        enriched.rsi = Some(27.5);
        enriched.sma_20 = Some(10.4);
        assert_eq!(enriched.field(Field::Rsi), Some(27.5));
        assert_eq!(enriched.field(Field::Sma20), Some(10.4));
    }

    #[test]
    fn test_enriched_bar_serde_skips_absent() {
        let enriched = EnrichedBar::from_bar(bar());
        let json = serde_json::to_string(&enriched).unwrap();
        assert!(!json.contains("rsi"));
        assert!(json.contains("\"close\":11.0"));
    }
}
