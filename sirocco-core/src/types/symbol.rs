//! Symbol type for representing ticker identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Symbol type - used for representing ticker identifiers.
///
/// Wraps a `String` value with validation to ensure proper format.
/// Tickers are typically short uppercase strings such as "AAPL" or "BRK.B".
///
/// # Examples
///
/// ```
/// use sirocco_core::types::Symbol;
///
/// let symbol = Symbol::new("AAPL").unwrap();
/// assert_eq!(symbol.as_str(), "AAPL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new `Symbol` from a string.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptySymbol` if the string is empty.
    /// Returns `ValidationError::InvalidSymbol` if the format is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if !s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '^')
        {
            return Err(ValidationError::InvalidSymbol(s));
        }
        Ok(Self(s))
    }

    /// Creates a new `Symbol` without validation.
    ///
    /// The caller must ensure the value is a valid ticker format.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_valid() {
        let symbol = Symbol::new("AAPL").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(format!("{symbol}"), "AAPL");
    }

    #[test]
    fn test_symbol_with_separators() {
        assert!(Symbol::new("BRK.B").is_ok());
        assert!(Symbol::new("BTC-USD").is_ok());
        assert!(Symbol::new("^GSPC").is_ok());
    }

    #[test]
    fn test_symbol_empty() {
        assert_eq!(Symbol::new(""), Err(ValidationError::EmptySymbol));
    }

    #[test]
    fn test_symbol_invalid_chars() {
        assert!(matches!(
            Symbol::new("AA PL"),
            Err(ValidationError::InvalidSymbol(_))
        ));
        assert!(matches!(
            Symbol::new("AAPL;"),
            Err(ValidationError::InvalidSymbol(_))
        ));
    }

    #[test]
    fn test_symbol_from_str() {
        let symbol: Symbol = "MSFT".parse().unwrap();
        assert_eq!(symbol.as_str(), "MSFT");
    }

    #[test]
    fn test_symbol_serde_transparent() {
        let symbol = Symbol::new("NVDA").unwrap();
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"NVDA\"");
        let parsed: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(symbol, parsed);
    }
}
