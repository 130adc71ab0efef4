use serde::{Deserialize, Serialize};

use crate::{Symbol, TradingDay, UtcDateTime, ValidationError};

/// Provider-fetched quote payload applied to a stored stock on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: Symbol,
    pub name: String,
    pub current_price: f64,
    pub change: f64,
    pub is_positive_change: bool,
    pub as_of: UtcDateTime,
}

impl QuoteSnapshot {
    pub fn new(
        symbol: Symbol,
        name: impl Into<String>,
        current_price: f64,
        change: f64,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        validate_non_negative("current_price", current_price)?;
        if !change.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "change" });
        }

        Ok(Self {
            symbol,
            name,
            current_price,
            change,
            is_positive_change: change >= 0.0,
            as_of,
        })
    }
}

/// One day of OHLC history for a symbol.
///
/// Prices are validated for finiteness and sign only. Upstream feeds emit
/// days where high < open, so no cross-field ordering is enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: TradingDay,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

impl HistoryEntry {
    pub fn new(
        date: TradingDay,
        open: f64,
        close: f64,
        high: f64,
        low: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("close", close)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;

        Ok(Self {
            date,
            open,
            close,
            high,
            low,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
