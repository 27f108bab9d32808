//! Currency codes, minor-unit rounding, and amount formatting.
//!
//! Amounts are [`Decimal`] values in the currency's major unit (`20.00` USD,
//! `1200` JPY). Every monetary step of a quote is rounded to the currency's
//! minor-unit precision with a single [`RoundingMode`].

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{ProrationError, Result};

/// Currencies without a minor unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND",
    "VUV", "XAF", "XOF", "XPF",
];

/// Currencies with three minor-unit digits.
const THREE_DECIMAL_CURRENCIES: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// Largest minor-unit exponent accepted anywhere in the crate.
pub const MAX_MINOR_UNITS: u32 = 6;

/// ISO 4217 currency code.
///
/// Always three uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from an ISO 4217 code.
    ///
    /// Lowercase input is accepted and normalized (`"usd"` becomes `"USD"`).
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidCurrency`] if the code is not three ASCII letters.
    ///
    /// # Examples
    ///
    /// ```
    /// use proration_engine::money::Currency;
    ///
    /// let usd = Currency::new("usd").unwrap();
    /// assert_eq!(usd.code(), "USD");
    /// assert_eq!(usd.minor_units(), 2);
    /// assert!(Currency::new("US").is_err());
    /// ```
    pub fn new<S: AsRef<str>>(code: S) -> Result<Self> {
        let code = code.as_ref();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ProrationError::InvalidCurrency(format!(
                "'{code}' is not a three-letter ISO 4217 code"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Returns the uppercase currency code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Returns the ISO 4217 minor-unit exponent (2 for USD, 0 for JPY, 3 for KWD).
    #[must_use]
    pub fn minor_units(&self) -> u32 {
        if ZERO_DECIMAL_CURRENCIES.contains(&self.code()) {
            0
        } else if THREE_DECIMAL_CURRENCIES.contains(&self.code()) {
            3
        } else {
            2
        }
    }

    fn symbol(&self) -> Option<&'static str> {
        let symbol = match self.code() {
            "USD" => "$",
            "EUR" => "€",
            "GBP" => "£",
            "JPY" => "¥",
            "CNY" => "CN¥",
            "INR" => "₹",
            "KRW" => "₩",
            "CAD" => "CA$",
            "AUD" => "A$",
            "NZD" => "NZ$",
            "BRL" => "R$",
            "MXN" => "MX$",
            _ => return None,
        };
        Some(symbol)
    }
}

impl TryFrom<String> for Currency {
    type Error = ProrationError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rounding rule applied to every monetary step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Midpoints round away from zero (`0.125` becomes `0.13`).
    #[default]
    HalfUp,
    /// Midpoints round to the nearest even digit (`0.125` becomes `0.12`).
    HalfEven,
}

impl RoundingMode {
    const fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

/// Rounds `amount` to `scale` fractional digits and pads it to exactly that scale.
///
/// # Examples
///
/// ```
/// use proration_engine::money::{RoundingMode, round_amount};
/// use rust_decimal::Decimal;
///
/// let amount = Decimal::new(125, 3); // 0.125
/// assert_eq!(round_amount(amount, 2, RoundingMode::HalfUp).to_string(), "0.13");
/// assert_eq!(round_amount(amount, 2, RoundingMode::HalfEven).to_string(), "0.12");
/// assert_eq!(round_amount(Decimal::from(15), 2, RoundingMode::HalfUp).to_string(), "15.00");
/// ```
#[must_use]
pub fn round_amount(amount: Decimal, scale: u32, mode: RoundingMode) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(scale, mode.strategy());
    rounded.rescale(scale);
    rounded
}

/// Converts a major-unit amount to integer minor units (`15.00` USD becomes `1500`).
///
/// The amount is rounded half-up first.
///
/// # Errors
///
/// Returns [`ProrationError::ArithmeticOverflow`] if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: &Currency) -> Result<i64> {
    let scale = currency.minor_units();
    let factor = Decimal::from(10_i64.pow(scale));
    round_amount(amount, scale, RoundingMode::HalfUp)
        .checked_mul(factor)
        .and_then(|units| units.to_i64())
        .ok_or_else(|| {
            ProrationError::ArithmeticOverflow(format!(
                "{amount} {currency} does not fit in integer minor units"
            ))
        })
}

/// Converts integer minor units to a major-unit amount (`1500` USD becomes `15.00`).
#[must_use]
pub fn from_minor_units(units: i64, currency: &Currency) -> Decimal {
    Decimal::new(units, currency.minor_units())
}

/// Renders an amount as a currency string.
///
/// Uses the currency's symbol when it has a well-known one and the code
/// otherwise. The amount is rounded half-up to the currency's minor units.
///
/// # Examples
///
/// ```
/// use proration_engine::money::{Currency, format_currency};
/// use rust_decimal::Decimal;
///
/// let usd = Currency::new("USD").unwrap();
/// assert_eq!(format_currency(Decimal::new(123_450, 2), &usd), "$1,234.50");
/// assert_eq!(format_currency(Decimal::new(-1500, 2), &usd), "-$15.00");
///
/// let kwd = Currency::new("KWD").unwrap();
/// assert_eq!(format_currency(Decimal::new(125, 2), &kwd), "KWD 1.250");
/// ```
#[must_use]
pub fn format_currency(amount: Decimal, currency: &Currency) -> String {
    format_currency_with_scale(amount, currency, currency.minor_units())
}

/// Renders an amount as a currency string with `scale` fractional digits.
///
/// Use this with [`EngineConfig::scale_for`](crate::config::EngineConfig::scale_for)
/// so that printed amounts match a quote computed under a minor-unit override.
///
/// # Examples
///
/// ```
/// use proration_engine::money::{Currency, format_currency_with_scale};
/// use rust_decimal::Decimal;
///
/// let jpy = Currency::new("JPY").unwrap();
/// assert_eq!(format_currency_with_scale(Decimal::new(100_050, 2), &jpy, 2), "¥1,000.50");
/// assert_eq!(format_currency_with_scale(Decimal::new(100_050, 2), &jpy, 0), "¥1,001");
/// ```
#[must_use]
pub fn format_currency_with_scale(amount: Decimal, currency: &Currency, scale: u32) -> String {
    let rounded = round_amount(amount, scale, RoundingMode::HalfUp);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };

    let digits = rounded.abs().to_string();
    let number = match digits.split_once('.') {
        Some((whole, fraction)) => format!("{}.{fraction}", group_thousands(whole)),
        None => group_thousands(&digits),
    };

    match currency.symbol() {
        Some(symbol) => format!("{sign}{symbol}{number}"),
        None => format!("{sign}{currency} {number}"),
    }
}

fn group_thousands(whole: &str) -> String {
    let len = whole.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
