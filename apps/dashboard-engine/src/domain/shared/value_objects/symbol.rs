//! Symbol value object for instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Maximum symbol length accepted by the venue (OCC option symbols are 21).
const MAX_SYMBOL_LEN: usize = 21;

/// A trading symbol, normalized to uppercase.
///
/// Examples: "SPY", "BRK.B", "BTC/USD".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol. Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_uppercase())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the symbol for order submission.
    ///
    /// # Errors
    ///
    /// Returns error if symbol is empty, too long, or contains characters
    /// other than ASCII alphanumerics, `.` and `/`.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::invalid("symbol", "Symbol cannot be empty"));
        }

        if self.0.len() > MAX_SYMBOL_LEN {
            return Err(DomainError::invalid(
                "symbol",
                "Symbol exceeds maximum length",
            ));
        }

        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '/')
        {
            return Err(DomainError::invalid(
                "symbol",
                "Symbol contains invalid characters",
            ));
        }

        Ok(())
    }

    /// Parse a comma-separated list (`"SPY,aapl, msft"`), skipping blanks.
    #[must_use]
    pub fn parse_list(input: &str) -> Vec<Self> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::new)
            .collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn normalizes_to_uppercase() {
        assert_eq!(Symbol::new(" spy ").as_str(), "SPY");
    }

    #[test_case("SPY" ; "plain equity")]
    #[test_case("BRK.B" ; "class share")]
    #[test_case("BTC/USD" ; "crypto pair")]
    #[test_case("AAPL250117P00190000" ; "occ option")]
    fn valid_symbols(raw: &str) {
        assert!(Symbol::new(raw).validate().is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("SP Y" ; "inner space")]
    #[test_case("SPY$" ; "punctuation")]
    #[test_case("ABCDEFGHIJKLMNOPQRSTUV" ; "too long")]
    fn invalid_symbols(raw: &str) {
        assert!(Symbol::new(raw).validate().is_err());
    }

    #[test]
    fn parse_list_skips_blanks() {
        let symbols = Symbol::parse_list("spy, AAPL,,msft ");
        assert_eq!(
            symbols,
            vec![Symbol::new("SPY"), Symbol::new("AAPL"), Symbol::new("MSFT")]
        );
    }
}
