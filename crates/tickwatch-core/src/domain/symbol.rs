use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 15;

/// Normalized market symbol/ticker.
///
/// A ticker is one or more ASCII letters with optional internal `.` or `-`
/// separators (share classes like `BRK.B`, `BF-B`). Matching is
/// case-insensitive; parsed symbols are stored uppercase. Digits and any
/// other punctuation are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a symbol to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        let mut chars = normalized.chars();
        if let Some(first) = chars.next() {
            if !first.is_ascii_alphabetic() {
                return Err(ValidationError::SymbolInvalidStart { ch: first });
            }
        }
        if let Some(last) = normalized.chars().next_back() {
            if !last.is_ascii_alphabetic() {
                return Err(ValidationError::SymbolInvalidEnd { ch: last });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphabetic() || ch == '.' || ch == '-';
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    /// Total, side-effect-free validity check for raw user input.
    pub fn check(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_symbol() {
        let parsed = Symbol::parse(" aapl ").expect("symbol should parse");
        assert_eq!(parsed.as_str(), "AAPL");
    }

    #[test]
    fn accepts_internal_separators_case_insensitively() {
        assert!(Symbol::check("aa-s"));
        assert!(Symbol::check("aa.s"));
        assert!(Symbol::check("AS.s"));
        assert_eq!(Symbol::parse("brk.b").expect("parses").as_str(), "BRK.B");
    }

    #[test]
    fn rejects_digits() {
        assert!(!Symbol::check("1234"));
        let err = Symbol::parse("AAPL1").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidEnd { .. }));
    }

    #[test]
    fn rejects_invalid_chars() {
        assert!(!Symbol::check("aas'asd"));
        let err = Symbol::parse("AA$PL").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidChar { .. }));
    }

    #[test]
    fn rejects_leading_and_trailing_separators() {
        assert!(!Symbol::check(".AAPL"));
        assert!(!Symbol::check("AAPL-"));
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(!Symbol::check("ÄAPL"));
        assert!(!Symbol::check(""));
    }
}
