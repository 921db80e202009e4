//! Timeframe enumeration for bar periods.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::ValidationError;

/// Bar timeframe enumeration.
///
/// Serialized with the pipeline's canonical names (`1min`, `5min`, ...);
/// [`Timeframe::chart_interval`] maps to the chart provider's interval codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1 minute
    #[serde(rename = "1min")]
    Min1,
    /// 5 minutes
    #[serde(rename = "5min")]
    Min5,
    /// 15 minutes
    #[serde(rename = "15min")]
    Min15,
    /// 1 hour
    #[serde(rename = "1hour")]
    Hour1,
    /// 1 day
    #[serde(rename = "1day")]
    Day1,
}

impl Timeframe {
    /// Returns the duration of one bar at this timeframe.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::Min1 => Duration::from_secs(60),
            Self::Min5 => Duration::from_secs(5 * 60),
            Self::Min15 => Duration::from_secs(15 * 60),
            Self::Hour1 => Duration::from_secs(60 * 60),
            Self::Day1 => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn millis(&self) -> i64 {
        self.duration().as_millis() as i64
    }

    /// Returns the canonical string representation (e.g., "5min").
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Min1 => "1min",
            Self::Min5 => "5min",
            Self::Min15 => "15min",
            Self::Hour1 => "1hour",
            Self::Day1 => "1day",
        }
    }

    /// Returns the chart provider interval code (e.g., "5m", "1h", "1d").
    #[must_use]
    pub const fn chart_interval(&self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" | "1m" => Ok(Self::Min1),
            "5min" | "5m" => Ok(Self::Min5),
            "15min" | "15m" => Ok(Self::Min15),
            "1hour" | "1h" | "60m" => Ok(Self::Hour1),
            "1day" | "1d" => Ok(Self::Day1),
            other => Err(ValidationError::UnknownTimeframe(other.to_string())),
        }
    }
}
