//! Currency conversion into the company reporting currency.
//!
//! Rates are expressed as units of a currency per one US dollar.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{MAX_MONEY_CENTS, MONEY_SCALE};
use crate::errors::{AppError, AppResult};

/// Built-in rate table (units per USD).
const DEFAULT_RATES: &[(&str, &str)] = &[
    ("USD", "1"),
    ("EUR", "0.92"),
    ("GBP", "0.79"),
    ("INR", "83.10"),
    ("JPY", "149.50"),
    ("CAD", "1.36"),
    ("AUD", "1.52"),
    ("CHF", "0.88"),
    ("CNY", "7.24"),
    ("SGD", "1.34"),
    ("AED", "3.6725"),
];

/// Converts monetary amounts between supported currencies.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    rates: HashMap<String, Decimal>,
}

impl CurrencyConverter {
    /// Converter with the built-in table only.
    pub fn with_defaults() -> Self {
        let rates = DEFAULT_RATES
            .iter()
            .filter_map(|(code, rate)| Decimal::from_str(rate).ok().map(|r| (code.to_string(), r)))
            .collect();
        Self { rates }
    }

    /// Converter with `CODE=rate,CODE=rate` overrides applied on top of the defaults.
    pub fn with_overrides(raw: Option<&str>) -> AppResult<Self> {
        let mut converter = Self::with_defaults();

        let Some(raw) = raw else {
            return Ok(converter);
        };

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, rate) = entry
                .split_once('=')
                .ok_or_else(|| AppError::internal(format!("Malformed exchange rate entry: {}", entry)))?;

            let code = normalize_code(code);
            if !is_currency_code(&code) {
                return Err(AppError::internal(format!("Invalid currency code: {}", code)));
            }

            let rate = Decimal::from_str(rate.trim())
                .map_err(|e| AppError::internal(format!("Invalid rate for {}: {}", code, e)))?;
            if rate <= Decimal::ZERO {
                return Err(AppError::internal(format!("Rate for {} must be positive", code)));
            }

            converter.rates.insert(code, rate);
        }

        Ok(converter)
    }

    /// Whether the currency can be converted.
    pub fn supports(&self, code: &str) -> bool {
        self.rates.contains_key(&normalize_code(code))
    }

    /// Supported codes, sorted.
    pub fn currencies(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.rates.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Convert `amount` from one currency to another, rounded to cents.
    ///
    /// Results above [`max_money`] are rejected as validation errors.
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> AppResult<Decimal> {
        let from = normalize_code(from);
        let to = normalize_code(to);

        let converted = if from == to {
            amount
        } else {
            let from_rate = self.rate(&from)?;
            let to_rate = self.rate(&to)?;

            amount
                .checked_div(from_rate)
                .and_then(|usd| usd.checked_mul(to_rate))
                .ok_or_else(|| AppError::validation("Amount is too large to convert"))?
        };

        let converted = round_money(converted);
        if converted > max_money() {
            return Err(AppError::validation(format!(
                "Converted amount cannot exceed {}",
                max_money()
            )));
        }

        Ok(converted)
    }

    fn rate(&self, code: &str) -> AppResult<Decimal> {
        self.rates
            .get(code)
            .copied()
            .ok_or_else(|| AppError::validation(format!("Unsupported currency: {}", code)))
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Trim and upper-case a currency code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Three upper-case ASCII letters.
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Largest amount the money columns hold.
pub fn max_money() -> Decimal {
    Decimal::new(MAX_MONEY_CENTS, MONEY_SCALE)
}

/// Round to the monetary scale, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
