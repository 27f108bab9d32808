//! Proration Engine: Plan-Change Quotes for Subscription Billing
//!
//! A Rust library that computes what a customer owes (or is owed) when a
//! subscription switches plans partway through a billing period.
//!
//! # What is a proration quote?
//!
//! When a subscription moves from one plan to another mid-cycle, the customer
//! has already paid for the rest of the period on the old plan. The engine:
//!
//! - **Credits** the unused time on the current plan
//! - **Charges** the remaining time at the new plan's price
//! - **Discounts** the net charge with an optional percent or fixed coupon
//! - **Taxes** whatever is left after the discount
//!
//! The result is a [`ProrationQuote`]: an itemized, immutable value that the
//! caller shows to the user before confirming the change.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Presentation   │  CLI, web handler, or UI
//! └────────┬────────┘
//!          │ PlanChangeRequest
//! ┌────────▼────────────────────────────────────────┐
//! │          PlanChangeService (this crate)         │
//! │  ┌──────────────────┐   ┌──────────────────┐    │
//! │  │ BillingProvider  │   │ ProrationEngine  │    │
//! │  │ (lookup/persist) │   │ (pure math)      │    │
//! │  └──────────────────┘   └──────────────────┘    │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! The engine performs no I/O. Fetching and persisting billing data belongs to
//! a [`BillingProvider`] implementation supplied by the caller.
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use proration_engine::{
//!     BillingInterval, Currency, Plan, PlanId, Subscription, SubscriptionId,
//!     compute_proration_quote,
//! };
//! use rust_decimal::Decimal;
//!
//! # fn example() -> proration_engine::Result<()> {
//! let usd = Currency::new("USD")?;
//! let basic =
//!     Plan::new(PlanId::new("basic")?, "Basic", Decimal::new(2000, 2), usd.clone(), BillingInterval::Month);
//! let pro = Plan::new(PlanId::new("pro")?, "Pro", Decimal::new(5000, 2), usd, BillingInterval::Month);
//!
//! let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
//! let subscription =
//!     Subscription::new(SubscriptionId::new("sub_1")?, basic.id.clone(), start, start + Duration::days(30))?;
//!
//! let quote =
//!     compute_proration_quote(&subscription, &basic, &pro, start + Duration::days(15), None, None)?;
//! assert_eq!(quote.total, Decimal::new(1500, 2));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Module Organization
//!
//! - [`models`]: plans, subscriptions, identifiers, billing intervals
//! - [`money`]: currencies, minor units, rounding, formatting
//! - [`discount`]: coupons and tax
//! - [`proration`]: fraction, credit and charge primitives
//! - [`quote`]: the [`ProrationEngine`] and plan comparison
//! - [`config`]: engine configuration loaded from TOML
//! - [`provider`]: the [`BillingProvider`] trait and an in-memory provider
//! - [`service`]: preview/confirm workflow over a provider
//! - [`error`]: error types
//!
//! # Rounding
//!
//! Every monetary step (credit, charge, coupon, tax) is rounded to the
//! currency's minor-unit scale with the configured [`RoundingMode`] (half-up
//! unless configured otherwise). Because each component is rounded before it
//! is summed, `total == charge - credit - coupon_discount + tax_amount` holds
//! exactly.
//!
//! # Error Handling
//!
//! All operations return [`Result<T, ProrationError>`](error::Result).
//! Validation failures are never defaulted silently:
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use proration_engine::{
//!     BillingInterval, Currency, Plan, PlanId, ProrationError, Subscription, SubscriptionId,
//!     compute_proration_quote,
//! };
//! use rust_decimal::Decimal;
//!
//! let usd = Plan::new(
//!     PlanId::new("basic").unwrap(),
//!     "Basic",
//!     Decimal::new(2000, 2),
//!     Currency::new("USD").unwrap(),
//!     BillingInterval::Month,
//! );
//! let eur = Plan::new(
//!     PlanId::new("pro-eu").unwrap(),
//!     "Pro EU",
//!     Decimal::new(5000, 2),
//!     Currency::new("EUR").unwrap(),
//!     BillingInterval::Month,
//! );
//! let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
//! let subscription = Subscription::new(
//!     SubscriptionId::new("sub_1").unwrap(),
//!     usd.id.clone(),
//!     start,
//!     start + Duration::days(30),
//! )
//! .unwrap();
//!
//! match compute_proration_quote(&subscription, &usd, &eur, start, None, None) {
//!     Err(ProrationError::CurrencyMismatch { current, new }) => {
//!         eprintln!("cannot prorate {current} into {new}");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod discount;
pub mod error;
pub mod models;
pub mod money;
pub mod proration;
pub mod provider;
pub mod quote;
pub mod service;

#[cfg(test)]
mod tests;

pub use config::{ChangeDatePolicy, EngineConfig};
pub use discount::{Coupon, Tax};
pub use error::{ProrationError, Result};
pub use models::{BillingInterval, Plan, PlanId, Subscription, SubscriptionId};
pub use money::{Currency, RoundingMode, format_currency, format_currency_with_scale};
pub use provider::{BillingProvider, Catalog, InMemoryBillingProvider};
pub use quote::{
    Adjustment, AdjustmentKind, PlanChangeKind, PlanDifference, ProrationEngine, ProrationQuote,
    calculate_plan_difference, compute_proration_quote,
};
pub use service::{PlanChangeRequest, PlanChangeService};
