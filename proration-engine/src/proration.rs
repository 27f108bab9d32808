//! Proration calculation utilities.
//!
//! Provides helpers for calculating prorated credits and charges
//! when subscriptions change mid-cycle, and for locating the billing period
//! a change date belongs to.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use crate::{
    config::ChangeDatePolicy,
    error::{ProrationError, Result},
    models::{Plan, Subscription},
};

/// Upper bound on periods walked by [`derive_period`].
const MAX_DERIVED_PERIODS: u32 = 100_000;

/// Returns the share of the period still ahead of `change_date`.
///
/// The result is clamped to `[0, 1]`: a date on or after `period_end` yields
/// 0, a date on or before `period_start` yields 1. A zero-length period yields 0.
/// Durations are measured in whole milliseconds.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use proration_engine::proration::remaining_fraction;
/// use rust_decimal::Decimal;
///
/// let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
/// let end = start + Duration::days(30);
/// let change = start + Duration::days(15);
///
/// assert_eq!(remaining_fraction(start, end, change), Decimal::new(5, 1));
/// ```
#[must_use]
pub fn remaining_fraction(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    change_date: DateTime<Utc>,
) -> Decimal {
    let total_duration = (period_end - period_start).num_milliseconds();
    if total_duration <= 0 || change_date >= period_end {
        return Decimal::ZERO;
    }
    if change_date <= period_start {
        return Decimal::ONE;
    }

    let remaining_duration = (period_end - change_date).num_milliseconds();
    Decimal::from(remaining_duration) / Decimal::from(total_duration)
}

/// Calculates prorated credit for unused time in current period.
///
/// # Arguments
///
/// * `current_period_start` - Start of the current billing period
/// * `current_period_end` - End of the current billing period
/// * `change_date` - When the change takes effect (clamped to the period)
/// * `current_amount` - Amount paid for the current period
///
/// # Errors
///
/// Returns [`ProrationError::ArithmeticOverflow`] if the multiplication overflows.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use rust_decimal::Decimal;
/// use proration_engine::proration::calculate_credit;
///
/// # fn example() -> proration_engine::error::Result<()> {
/// let period_start = Utc::now();
/// let period_end = period_start + chrono::Duration::days(30);
/// let change_date = period_start + chrono::Duration::days(15);
/// let current_amount = Decimal::new(3000, 2); // $30.00
///
/// let credit = calculate_credit(period_start, period_end, change_date, current_amount)?;
/// assert_eq!(credit, Decimal::new(1500, 2));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn calculate_credit(
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    change_date: DateTime<Utc>,
    current_amount: Decimal,
) -> Result<Decimal> {
    let proration_factor =
        remaining_fraction(current_period_start, current_period_end, change_date);

    current_amount
        .checked_mul(proration_factor)
        .ok_or_else(|| ProrationError::ArithmeticOverflow("overflow in credit calculation".into()))
}

/// Calculates prorated charge for a new plan starting mid-cycle.
///
/// # Arguments
///
/// * `current_period_start` - Start of the current billing period
/// * `current_period_end` - End of the current billing period
/// * `change_date` - When the change takes effect (clamped to the period)
/// * `new_amount` - Amount for the new plan per period
///
/// # Errors
///
/// Returns [`ProrationError::ArithmeticOverflow`] if the multiplication overflows.
pub fn calculate_charge(
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    change_date: DateTime<Utc>,
    new_amount: Decimal,
) -> Result<Decimal> {
    let proration_factor =
        remaining_fraction(current_period_start, current_period_end, change_date);

    new_amount
        .checked_mul(proration_factor)
        .ok_or_else(|| ProrationError::ArithmeticOverflow("overflow in charge calculation".into()))
}

/// Returns the date the subscription renews after a plan change.
///
/// A mid-cycle change does not move the cycle boundary: the next renewal
/// still happens at the end of the current period and bills the new plan's
/// full price.
#[must_use]
pub const fn next_billing_date(subscription: &Subscription) -> DateTime<Utc> {
    subscription.current_period_end
}

/// Maps a requested change date onto the current billing period.
///
/// Dates inside the period pass through unchanged. Dates within one billing
/// period of `current_plan` before the start or after the end are clamped to
/// the nearest boundary. Dates beyond that window are clamped or rejected
/// according to `policy`.
///
/// # Errors
///
/// Returns [`ProrationError::InvalidChangeDate`] under [`ChangeDatePolicy::Reject`]
/// when the date lies outside the window, or [`ProrationError::InvalidPeriod`] if the
/// period is reversed or the window boundaries cannot be represented.
pub fn resolve_change_date(
    subscription: &Subscription,
    current_plan: &Plan,
    change_date: DateTime<Utc>,
    policy: ChangeDatePolicy,
) -> Result<DateTime<Utc>> {
    subscription.validate()?;
    let start = subscription.current_period_start;
    let end = subscription.current_period_end;

    if subscription.period_contains(change_date) {
        return Ok(change_date);
    }

    if policy == ChangeDatePolicy::Reject {
        let earliest = current_plan.retreat_periods(start, 1)?;
        let latest = current_plan.advance_periods(end, 1)?;
        if change_date < earliest || change_date > latest {
            return Err(ProrationError::InvalidChangeDate(format!(
                "{change_date} is more than one {} outside the period {start} to {end} of \
                 subscription {}",
                current_plan.interval, subscription.id
            )));
        }
    }

    let clamped = change_date.clamp(start, end);
    warn!(
        subscription_id = %subscription.id,
        requested = %change_date,
        effective = %clamped,
        "change date outside current period, clamped"
    );
    Ok(clamped)
}

/// Returns the `(start, end)` of the billing period of `plan` that contains `at`,
/// for a subscription that started at `anchor`.
///
/// Boundaries are computed from the anchor each time, so a subscription
/// anchored on the 31st keeps renewing on the last day of shorter months and
/// returns to the 31st afterwards.
///
/// # Errors
///
/// Returns [`ProrationError::InvalidPeriod`] if `at` precedes `anchor` or lies
/// too many periods after it, or [`ProrationError::InvalidPlan`] for an invalid plan.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use proration_engine::{
///     models::{BillingInterval, Plan, PlanId},
///     money::Currency,
///     proration::derive_period,
/// };
/// use rust_decimal::Decimal;
///
/// let plan = Plan::new(
///     PlanId::new("pro").unwrap(),
///     "Pro",
///     Decimal::from(50),
///     Currency::new("USD").unwrap(),
///     BillingInterval::Month,
/// );
/// let anchor = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
/// let at = Utc.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap();
///
/// let (start, end) = derive_period(anchor, &plan, at).unwrap();
/// assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
/// assert_eq!(end, Utc.with_ymd_and_hms(2025, 4, 15, 0, 0, 0).unwrap());
/// ```
pub fn derive_period(
    anchor: DateTime<Utc>,
    plan: &Plan,
    at: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    plan.validate()?;
    if at < anchor {
        return Err(ProrationError::InvalidPeriod(format!(
            "{at} is before the subscription anchor {anchor}"
        )));
    }

    let mut start = anchor;
    for elapsed in 1..=MAX_DERIVED_PERIODS {
        let end = plan.advance_periods(anchor, elapsed)?;
        if at < end {
            return Ok((start, end));
        }
        start = end;
    }

    Err(ProrationError::InvalidPeriod(format!(
        "{at} is more than {MAX_DERIVED_PERIODS} periods after the anchor {anchor}"
    )))
}
