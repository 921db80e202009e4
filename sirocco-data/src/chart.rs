//! Yahoo-style chart HTTP client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use sirocco_core::data::Bar;
use sirocco_core::error::DataError;
use sirocco_core::types::{Symbol, Timeframe, Timestamp};

use crate::provider::{HistoryProvider, HistoryRange};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "sirocco/0.3";

/// Chart API client.
///
/// Fetches `GET {base}/v8/finance/chart/{ticker}?interval=..&range=..` and
/// parses the response's nullable parallel arrays into validated bars,
/// dropping any row with a missing field.
pub struct ChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChartClient {
    /// Creates a client against the default provider endpoint.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Fetch` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom endpoint (tests, proxies).
    ///
    /// # Errors
    ///
    /// Returns `DataError::Fetch` if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| DataError::Fetch {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn chart_url(&self, ticker: &Symbol, timeframe: Timeframe, range: HistoryRange) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval={}&range={}",
            self.base_url,
            ticker,
            timeframe.chart_interval(),
            range.as_str()
        )
    }
}

#[async_trait]
impl HistoryProvider for ChartClient {
    async fn fetch(
        &self,
        ticker: &Symbol,
        timeframe: Timeframe,
        range: HistoryRange,
    ) -> Result<Vec<Bar>, DataError> {
        let url = self.chart_url(ticker, timeframe, range);
        debug!(%url, "fetching chart data");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::Fetch {
                reason: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Fetch {
                reason: format!("provider returned status {status}"),
            });
        }

        let payload: ChartResponse = response.json().await.map_err(|e| DataError::Parse {
            reason: format!("malformed chart payload: {e}"),
        })?;

        bars_from_response(ticker, &payload)
    }
}

/// Top-level chart payload.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartNode,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartErrorNode>,
}

#[derive(Debug, Deserialize)]
struct ChartErrorNode {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<Option<i64>>>,
    indicators: IndicatorsNode,
}

#[derive(Debug, Deserialize)]
struct IndicatorsNode {
    quote: Vec<QuoteNode>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteNode {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Converts a chart payload into validated bars, dropping null rows.
fn bars_from_response(ticker: &Symbol, payload: &ChartResponse) -> Result<Vec<Bar>, DataError> {
    if let Some(error) = &payload.chart.error {
        return Err(DataError::Fetch {
            reason: format!(
                "provider error {}: {}",
                error.code.as_deref().unwrap_or("unknown"),
                error.description.as_deref().unwrap_or("no description")
            ),
        });
    }

    let result = payload
        .chart
        .result
        .as_ref()
        .and_then(|r| r.first())
        .ok_or_else(|| DataError::Parse {
            reason: "empty chart result".to_string(),
        })?;

    let timestamps = result.timestamp.as_deref().unwrap_or(&[]);
    let quote = result.indicators.quote.first().ok_or_else(|| DataError::Parse {
        reason: "missing quote arrays".to_string(),
    })?;

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut dropped = 0_usize;
    for (i, ts) in timestamps.iter().enumerate() {
        let row = (
            *ts,
            value_at(&quote.open, i),
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.close, i),
            value_at(&quote.volume, i),
        );
        let (Some(ts), Some(open), Some(high), Some(low), Some(close), Some(volume)) = row else {
            dropped += 1;
            continue;
        };
        let Ok(timestamp) = Timestamp::from_secs(ts) else {
            dropped += 1;
            continue;
        };
        match Bar::new(ticker.clone(), timestamp, open, high, low, close, volume) {
            Ok(bar) => bars.push(bar),
            Err(_) => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(ticker = %ticker, dropped, kept = bars.len(), "dropped chart rows with null or invalid fields");
    }
    Ok(bars)
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten().filter(|v| v.is_finite())
}
