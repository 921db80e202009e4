//! Session mode state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of a session.
///
/// Transitions: RESEARCH → TRADING (gate #1 passes), TRADING → RESEARCH
/// (gate #2, drift), TRADING → PAUSED (gate #3, redline). PAUSED is terminal
/// for the session; only an explicit `resume()` returns to RESEARCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Compiling and backtesting strategies; no live decisions.
    Research,
    /// Live bars drive paper trading.
    Trading,
    /// Hard-stopped by the redline gate.
    Paused,
}

impl Mode {
    /// Returns the mode as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "RESEARCH",
            Self::Trading => "TRADING",
            Self::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
