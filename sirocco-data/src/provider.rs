//! History provider trait and range escalation.

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

use sirocco_core::data::Bar;
use sirocco_core::error::DataError;
use sirocco_core::types::{Symbol, Timeframe};

/// Provider-style history range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryRange {
    /// One month.
    Month1,
    /// Three months.
    Month3,
    /// Six months.
    Month6,
    /// One year.
    Year1,
    /// Two years.
    Year2,
}

impl HistoryRange {
    /// Returns the provider's range code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ranges tried, in order, until enough bars come back.
pub const ESCALATION_RANGES: [HistoryRange; 4] = [
    HistoryRange::Month3,
    HistoryRange::Month6,
    HistoryRange::Year1,
    HistoryRange::Year2,
];

/// Fetches historical bars for a ticker.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetches bars for the ticker over the range at the given timeframe.
    ///
    /// Bars are returned time-ordered; rows with missing fields are dropped
    /// by the provider.
    async fn fetch(
        &self,
        ticker: &Symbol,
        timeframe: Timeframe,
        range: HistoryRange,
    ) -> Result<Vec<Bar>, DataError>;
}

/// Fetches history, escalating through [`ESCALATION_RANGES`] until at least
/// `min_points` bars are available.
///
/// Individual fetch failures are logged and treated as an escalation step;
/// the call only fails once every range is exhausted.
///
/// # Errors
///
/// Returns `DataError::RangesExhausted` when no range yields enough bars.
pub async fn fetch_with_escalation(
    provider: &dyn HistoryProvider,
    ticker: &Symbol,
    timeframe: Timeframe,
    min_points: usize,
) -> Result<Vec<Bar>, DataError> {
    for range in ESCALATION_RANGES {
        match provider.fetch(ticker, timeframe, range).await {
            Ok(bars) if bars.len() >= min_points => {
                debug!(ticker = %ticker, %range, bars = bars.len(), "history fetched");
                return Ok(bars);
            }
            Ok(bars) => {
                debug!(
                    ticker = %ticker,
                    %range,
                    bars = bars.len(),
                    min_points,
                    "not enough bars, escalating range"
                );
            }
            Err(err) => {
                warn!(ticker = %ticker, %range, error = %err, "history fetch failed, escalating range");
            }
        }
    }
    Err(DataError::RangesExhausted {
        ticker: ticker.to_string(),
        required: min_points,
    })
}
