//! The spec-producer seam.
//!
//! The slow-path planner (an LLM-driven agent in production) lives outside
//! this workspace; the orchestrator only sees this trait. The template
//! producer renders deterministic specs for the CLI and tests.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use sirocco_core::error::SiroccoError;
use sirocco_core::types::{Symbol, Timeframe, Timestamp};

use crate::spec::{DataRequirements, RiskParameters, Signal, SignalAction, StrategySpec};

/// Produces a compiled strategy spec from a natural-language query.
///
/// Implementations must return specs that satisfy every invariant checked by
/// [`StrategySpec::validate`]; the orchestrator re-validates and surfaces any
/// violation as `InvalidSpec`.
#[async_trait]
pub trait SpecProducer: Send + Sync {
    /// Compiles a strategy for the query.
    async fn compile_strategy(&self, query: &str) -> Result<StrategySpec, SiroccoError>;

    /// Short provider name for display.
    fn name(&self) -> &str;
}

/// Template family the deterministic producer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStyle {
    /// RSI dip-buying with an SMA trend filter.
    MeanReversion,
    /// MACD crossover with a volume confirmation.
    Momentum,
}

impl TemplateStyle {
    /// Returns the style name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MeanReversion => "mean-reversion",
            Self::Momentum => "momentum",
        }
    }
}

/// Deterministic spec producer rendering one of two signal templates.
///
/// The ticker is taken from the first 1-5 character all-uppercase word in
/// the query, falling back to a configured default.
pub struct TemplateSpecProducer {
    style: TemplateStyle,
    default_ticker: Symbol,
    ttl: Duration,
}

impl TemplateSpecProducer {
    /// Creates a producer with the given template style.
    #[must_use]
    pub fn new(style: TemplateStyle, default_ticker: Symbol) -> Self {
        Self {
            style,
            default_ticker,
            ttl: Duration::from_secs(60 * 60),
        }
    }

    /// Sets the spec time-to-live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the template style.
    #[must_use]
    pub const fn style(&self) -> TemplateStyle {
        self.style
    }

    fn ticker_from_query(&self, query: &str) -> Symbol {
        query
            .split_whitespace()
            .find(|word| {
                (1..=5).contains(&word.len())
                    && word.chars().all(|c| c.is_ascii_uppercase() || c == '.')
            })
            .and_then(|word| Symbol::new(word).ok())
            .unwrap_or_else(|| self.default_ticker.clone())
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn render(&self, query: &str) -> StrategySpec {
        let ticker = self.ticker_from_query(query);
        let now = Timestamp::now();
        let expires_at = Timestamp::new_unchecked(now.as_millis() + self.ttl.as_millis() as i64);

        let (indicators, signals, lookback, min_data_points) = match self.style {
            TemplateStyle::MeanReversion => (
                vec![
                    "rsi".to_string(),
                    "sma_20".to_string(),
                    "sma_50".to_string(),
                ],
                vec![
                    Signal {
                        id: "rsi_dip_buy".to_string(),
                        condition: "rsi < 30 && close > sma_50".to_string(),
                        action: SignalAction::Buy,
                        position_size: 0.1,
                        confidence: 0.7,
                        reasoning: "oversold pullback within an uptrend".to_string(),
                        priority: 10,
                    },
                    Signal {
                        id: "rsi_peak_sell".to_string(),
                        condition: "rsi > 70".to_string(),
                        action: SignalAction::Sell,
                        position_size: 0.1,
                        confidence: 0.6,
                        reasoning: "overbought exit".to_string(),
                        priority: 5,
                    },
                ],
                100,
                55,
            ),
            TemplateStyle::Momentum => (
                vec![
                    "macd".to_string(),
                    "sma_20".to_string(),
                    "volume_avg".to_string(),
                ],
                vec![
                    Signal {
                        id: "macd_cross_buy".to_string(),
                        condition: "macd > macd_signal && close > sma_20 && volume_ratio > 1.2"
                            .to_string(),
                        action: SignalAction::Buy,
                        position_size: 0.1,
                        confidence: 0.65,
                        reasoning: "momentum confirmation with above-average volume".to_string(),
                        priority: 10,
                    },
                    Signal {
                        id: "macd_cross_sell".to_string(),
                        condition: "macd < macd_signal".to_string(),
                        action: SignalAction::Sell,
                        position_size: 0.1,
                        confidence: 0.6,
                        reasoning: "momentum rollover".to_string(),
                        priority: 5,
                    },
                ],
                80,
                40,
            ),
        };

        StrategySpec {
            id: format!("spec-{}-{}", ticker, Uuid::new_v4()),
            ticker,
            timeframe: Timeframe::Min5,
            data_requirements: DataRequirements {
                indicators,
                lookback,
                min_data_points,
            },
            signals,
            risk_params: RiskParameters::default(),
            compiled_at: now,
            expires_at,
            source_query: query.to_string(),
        }
    }
}

#[async_trait]
impl SpecProducer for TemplateSpecProducer {
    async fn compile_strategy(&self, query: &str) -> Result<StrategySpec, SiroccoError> {
        let spec = self.render(query);
        spec.validate()?;
        Ok(spec)
    }

    fn name(&self) -> &str {
        self.style.as_str()
    }
}
