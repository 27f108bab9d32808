//! Error types for the proration engine.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Validation errors** ([`ProrationError::InvalidPlan`],
//!   [`ProrationError::CurrencyMismatch`], [`ProrationError::InvalidCoupon`], ...): the caller
//!   supplied inconsistent data. These are never defaulted away.
//! - **Range errors** ([`ProrationError::InvalidChangeDate`]): the change date falls outside the
//!   window the configured policy accepts.
//! - **Arithmetic errors** ([`ProrationError::ArithmeticOverflow`]): a checked decimal
//!   operation overflowed.
//! - **Provider errors** ([`ProrationError::NotFound`], [`ProrationError::StaleQuote`]): a
//!   [`BillingProvider`](crate::provider::BillingProvider) could not resolve or persist data.
//!
//! # Examples
//!
//! ```
//! use proration_engine::error::{ProrationError, Result};
//!
//! fn ensure_same_currency(a: &str, b: &str) -> Result<()> {
//!     if a != b {
//!         return Err(ProrationError::CurrencyMismatch { current: a.to_owned(), new: b.to_owned() });
//!     }
//!     Ok(())
//! }
//!
//! assert!(ensure_same_currency("USD", "EUR").is_err());
//! ```

use thiserror::Error;

/// Result type alias for engine operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, ProrationError>;

/// Errors that can occur while building or applying a proration quote.
///
/// A quote is computed atomically: when any of these is returned, no partial
/// quote exists.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProrationError {
    /// The current and target plans are priced in different currencies.
    ///
    /// Cross-currency proration has no single well-defined total, so the
    /// engine refuses to produce a quote.
    #[error("Currency mismatch: current plan is {current}, new plan is {new}")]
    CurrencyMismatch {
        /// Currency of the plan the subscription is on.
        current: String,
        /// Currency of the plan being switched to.
        new: String,
    },

    /// The change date lies outside the window accepted by the engine.
    ///
    /// # Recovery
    ///
    /// Pick a date within one billing interval of the current period, or
    /// configure the engine with
    /// [`ChangeDatePolicy::Clamp`](crate::config::ChangeDatePolicy::Clamp).
    #[error("Invalid change date: {0}")]
    InvalidChangeDate(String),

    /// Plan data is missing or inconsistent.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Plan identifier failed validation.
    #[error("Invalid plan ID: {0}")]
    InvalidPlanId(String),

    /// Subscription identifier failed validation.
    #[error("Invalid subscription ID: {0}")]
    InvalidSubscriptionId(String),

    /// Billing period boundaries are inconsistent.
    #[error("Invalid billing period: {0}")]
    InvalidPeriod(String),

    /// Coupon value is out of range.
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    /// Tax rate is out of range.
    #[error("Invalid tax: {0}")]
    InvalidTax(String),

    /// Currency code is not a valid ISO 4217 code.
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// A checked decimal operation overflowed.
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Engine configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A billing provider has no record for the requested entity.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The subscription changed after the quote was computed.
    ///
    /// # Recovery
    ///
    /// Request a fresh quote and present it to the user again.
    #[error("Stale quote: {0}")]
    StaleQuote(String),

    /// A document could not be serialized or deserialized.
    #[error("Serialization failed: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ProrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ProrationError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
