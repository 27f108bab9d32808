//! Plan and subscription data models.
//!
//! These are immutable reference values handed to the engine by a
//! [`BillingProvider`](crate::provider::BillingProvider) or built by the caller.

use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProrationError, Result},
    money::Currency,
};

/// Maximum identifier length for plans and subscriptions.
const MAX_ID_LEN: usize = 64;

fn validate_id(id: &str, field: &str) -> std::result::Result<(), String> {
    if id.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(format!("{field} must be {MAX_ID_LEN} characters or less"));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!(
            "{field} can only contain alphanumeric characters, hyphens, and underscores"
        ));
    }
    Ok(())
}

/// Unique identifier for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    /// Creates a new plan ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if ID is empty, exceeds 64 characters, or contains invalid characters.
    /// Only alphanumeric characters, hyphens, and underscores are allowed.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        validate_id(&id, "plan_id").map_err(ProrationError::InvalidPlanId)?;
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanId {
    type Error = ProrationError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PlanId> for String {
    fn from(value: PlanId) -> Self {
        value.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Creates a new subscription ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if ID is empty, exceeds 64 characters, or contains invalid characters.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        validate_id(&id, "subscription_id").map_err(ProrationError::InvalidSubscriptionId)?;
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubscriptionId {
    type Error = ProrationError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SubscriptionId> for String {
    fn from(value: SubscriptionId) -> Self {
        value.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recurring billing cadence of a plan price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Daily billing.
    Day,
    /// Weekly billing.
    Week,
    /// Monthly billing (calendar months).
    Month,
    /// Annual billing (twelve calendar months).
    Year,
}

impl BillingInterval {
    /// Returns human-readable interval description.
    #[must_use]
    pub const fn interval_display(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Number of intervals in a year, used to normalize prices across cadences.
    #[must_use]
    pub const fn periods_per_year(self) -> u32 {
        match self {
            Self::Day => 365,
            Self::Week => 52,
            Self::Month => 12,
            Self::Year => 1,
        }
    }

    /// Moves `date` forward by `count` intervals.
    ///
    /// Month and year intervals use calendar months, so the day of month is
    /// clamped when the target month is shorter (Jan 31 + 1 month = Feb 28/29).
    /// Returns `None` on overflow.
    #[must_use]
    pub fn advance(self, date: DateTime<Utc>, count: u32) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => date.checked_add_signed(Duration::try_days(i64::from(count))?),
            Self::Week => date.checked_add_signed(Duration::try_weeks(i64::from(count))?),
            Self::Month => date.checked_add_months(Months::new(count)),
            Self::Year => date.checked_add_months(Months::new(count.checked_mul(12)?)),
        }
    }

    /// Moves `date` backward by `count` intervals. Returns `None` on overflow.
    #[must_use]
    pub fn retreat(self, date: DateTime<Utc>, count: u32) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => date.checked_sub_signed(Duration::try_days(i64::from(count))?),
            Self::Week => date.checked_sub_signed(Duration::try_weeks(i64::from(count))?),
            Self::Month => date.checked_sub_months(Months::new(count)),
            Self::Year => date.checked_sub_months(Months::new(count.checked_mul(12)?)),
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interval_display())
    }
}

const fn default_interval_count() -> u32 {
    1
}

/// A priced plan in the catalog.
///
/// `price` is the amount billed every `interval_count` × `interval`, in the
/// currency's major unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Price per billing period.
    pub price: Decimal,
    /// Currency code (ISO 4217).
    pub currency: Currency,
    /// Billing cadence.
    pub interval: BillingInterval,
    /// Number of intervals per billing period (3 with `month` bills quarterly).
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
}

impl Plan {
    /// Creates a plan billed once per `interval`.
    #[must_use]
    pub fn new<N: Into<String>>(
        id: PlanId,
        name: N,
        price: Decimal,
        currency: Currency,
        interval: BillingInterval,
    ) -> Self {
        Self { id, name: name.into(), price, currency, interval, interval_count: 1 }
    }

    /// Sets the number of intervals per billing period.
    #[must_use]
    pub fn with_interval_count(mut self, interval_count: u32) -> Self {
        self.interval_count = interval_count;
        self
    }

    /// Validates the plan definition.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPlan`] if:
    /// - name is blank
    /// - price is negative
    /// - `interval_count` is zero
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProrationError::InvalidPlan(format!("plan {} has an empty name", self.id)));
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(ProrationError::InvalidPlan(format!(
                "plan {} has a negative price {}",
                self.id, self.price
            )));
        }
        if self.interval_count == 0 {
            return Err(ProrationError::InvalidPlan(format!(
                "plan {} has an interval_count of zero",
                self.id
            )));
        }
        Ok(())
    }

    /// Returns the price normalized to one calendar month.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::ArithmeticOverflow`] if the normalization overflows, or
    /// [`ProrationError::InvalidPlan`] if `interval_count` is zero.
    pub fn monthly_equivalent(&self) -> Result<Decimal> {
        if self.interval_count == 0 {
            return Err(ProrationError::InvalidPlan(format!(
                "plan {} has an interval_count of zero",
                self.id
            )));
        }
        let per_year = Decimal::from(self.interval.periods_per_year());
        let divisor = Decimal::from(12_u32) * Decimal::from(self.interval_count);
        self.price.checked_mul(per_year).and_then(|yearly| yearly.checked_div(divisor)).ok_or_else(
            || ProrationError::ArithmeticOverflow(format!("monthly price of plan {}", self.id)),
        )
    }

    /// Returns `date` moved forward by `periods` full billing periods of this plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPeriod`] if the date cannot be represented.
    pub fn advance_periods(&self, date: DateTime<Utc>, periods: u32) -> Result<DateTime<Utc>> {
        self.interval_count
            .checked_mul(periods)
            .and_then(|count| self.interval.advance(date, count))
            .ok_or_else(|| {
                ProrationError::InvalidPeriod(format!(
                    "cannot advance {date} by {periods} periods of plan {}",
                    self.id
                ))
            })
    }

    /// Returns `date` moved backward by `periods` full billing periods of this plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPeriod`] if the date cannot be represented.
    pub fn retreat_periods(&self, date: DateTime<Utc>, periods: u32) -> Result<DateTime<Utc>> {
        self.interval_count
            .checked_mul(periods)
            .and_then(|count| self.interval.retreat(date, count))
            .ok_or_else(|| {
                ProrationError::InvalidPeriod(format!(
                    "cannot move {date} back by {periods} periods of plan {}",
                    self.id
                ))
            })
    }
}

/// The billing cycle a subscription is in at the moment of calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription identifier.
    pub id: SubscriptionId,
    /// Plan the subscription is currently billed on.
    pub plan_id: PlanId,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period (next renewal).
    pub current_period_end: DateTime<Utc>,
}

impl Subscription {
    /// Creates a subscription after checking the period boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPeriod`] if the period ends before it starts.
    pub fn new(
        id: SubscriptionId,
        plan_id: PlanId,
        current_period_start: DateTime<Utc>,
        current_period_end: DateTime<Utc>,
    ) -> Result<Self> {
        let subscription = Self { id, plan_id, current_period_start, current_period_end };
        subscription.validate()?;
        Ok(subscription)
    }

    /// Checks that the current period does not end before it starts.
    ///
    /// A zero-length period is valid.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPeriod`] on reversed boundaries.
    pub fn validate(&self) -> Result<()> {
        if self.current_period_end < self.current_period_start {
            return Err(ProrationError::InvalidPeriod(format!(
                "subscription {} ends at {} before it starts at {}",
                self.id, self.current_period_end, self.current_period_start
            )));
        }
        Ok(())
    }

    /// Returns whether `at` falls inside the current period (inclusive).
    #[must_use]
    pub fn period_contains(&self, at: DateTime<Utc>) -> bool {
        self.current_period_start <= at && at <= self.current_period_end
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn plan(interval: BillingInterval, price: Decimal) -> Plan {
        Plan::new(
            PlanId::new("pro").unwrap(),
            "Pro",
            price,
            Currency::new("USD").unwrap(),
            interval,
        )
    }

    // ========================================================================
    // Identifier Tests
    // ========================================================================

    #[test]
    fn test_plan_id_valid() {
        assert_eq!(PlanId::new("plan_basic-2024").unwrap().as_str(), "plan_basic-2024");
    }

    #[test]
    fn test_plan_id_rejects_invalid() {
        assert!(matches!(PlanId::new(""), Err(ProrationError::InvalidPlanId(_))));
        assert!(matches!(PlanId::new("a".repeat(65)), Err(ProrationError::InvalidPlanId(_))));
        assert!(matches!(PlanId::new("plan/../x"), Err(ProrationError::InvalidPlanId(_))));
    }

    #[test]
    fn test_subscription_id_rejects_invalid() {
        let result = SubscriptionId::new("sub 1");
        assert!(matches!(result, Err(ProrationError::InvalidSubscriptionId(_))));
    }

    #[test]
    fn test_ids_deserialize_with_validation() {
        let id: PlanId = serde_json::from_str("\"starter\"").unwrap();
        assert_eq!(id.as_str(), "starter");
        assert!(serde_json::from_str::<SubscriptionId>("\"\"").is_err());
    }

    // ========================================================================
    // Interval Tests
    // ========================================================================

    #[test]
    fn test_interval_advance_month_clamps_day() {
        let next = BillingInterval::Month.advance(ts(2025, 1, 31), 1).unwrap();
        assert_eq!(next, ts(2025, 2, 28));
    }

    #[test]
    fn test_interval_advance_and_retreat() {
        let start = ts(2025, 3, 10);
        assert_eq!(BillingInterval::Day.advance(start, 5).unwrap(), ts(2025, 3, 15));
        assert_eq!(BillingInterval::Week.advance(start, 2).unwrap(), ts(2025, 3, 24));
        assert_eq!(BillingInterval::Year.advance(start, 1).unwrap(), ts(2026, 3, 10));
        assert_eq!(BillingInterval::Month.retreat(start, 3).unwrap(), ts(2024, 12, 10));
    }

    #[test]
    fn test_interval_serde_snake_case() {
        assert_eq!(serde_json::to_string(&BillingInterval::Month).unwrap(), "\"month\"");
        let parsed: BillingInterval = serde_json::from_str("\"year\"").unwrap();
        assert_eq!(parsed, BillingInterval::Year);
    }

    // ========================================================================
    // Plan Tests
    // ========================================================================

    #[test]
    fn test_plan_validate() {
        assert!(plan(BillingInterval::Month, dec!(20.00)).validate().is_ok());
        assert!(plan(BillingInterval::Month, Decimal::ZERO).validate().is_ok());
        assert!(plan(BillingInterval::Month, dec!(-1)).validate().is_err());
        assert!(plan(BillingInterval::Month, dec!(5)).with_interval_count(0).validate().is_err());

        let mut unnamed = plan(BillingInterval::Month, dec!(5));
        unnamed.name = "  ".into();
        assert!(matches!(unnamed.validate(), Err(ProrationError::InvalidPlan(_))));
    }

    #[test]
    fn test_plan_monthly_equivalent() {
        assert_eq!(plan(BillingInterval::Month, dec!(20)).monthly_equivalent().unwrap(), dec!(20));
        assert_eq!(plan(BillingInterval::Year, dec!(240)).monthly_equivalent().unwrap(), dec!(20));
        assert_eq!(plan(BillingInterval::Week, dec!(12)).monthly_equivalent().unwrap(), dec!(52));

        let quarterly = plan(BillingInterval::Month, dec!(60)).with_interval_count(3);
        assert_eq!(quarterly.monthly_equivalent().unwrap(), dec!(20));
    }

    #[test]
    fn test_plan_interval_count_defaults_to_one() {
        let json = r#"{"id":"basic","name":"Basic","price":"9.99","currency":"USD","interval":"month"}"#;
        let parsed: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.interval_count, 1);
        assert_eq!(parsed.price, dec!(9.99));
    }

    #[test]
    fn test_plan_advance_periods_quarterly() {
        let quarterly = plan(BillingInterval::Month, dec!(60)).with_interval_count(3);
        assert_eq!(quarterly.advance_periods(ts(2025, 1, 1), 2).unwrap(), ts(2025, 7, 1));
        assert_eq!(quarterly.retreat_periods(ts(2025, 1, 1), 1).unwrap(), ts(2024, 10, 1));
    }

    // ========================================================================
    // Subscription Tests
    // ========================================================================

    #[test]
    fn test_subscription_rejects_reversed_period() {
        let result = Subscription::new(
            SubscriptionId::new("sub_1").unwrap(),
            PlanId::new("pro").unwrap(),
            ts(2025, 2, 1),
            ts(2025, 1, 1),
        );
        assert!(matches!(result, Err(ProrationError::InvalidPeriod(_))));
    }

    #[test]
    fn test_subscription_zero_length_period_is_valid() {
        let result = Subscription::new(
            SubscriptionId::new("sub_1").unwrap(),
            PlanId::new("pro").unwrap(),
            ts(2025, 1, 1),
            ts(2025, 1, 1),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_subscription_period_contains() {
        let sub = Subscription::new(
            SubscriptionId::new("sub_1").unwrap(),
            PlanId::new("pro").unwrap(),
            ts(2025, 1, 1),
            ts(2025, 2, 1),
        )
        .unwrap();
        assert!(sub.period_contains(ts(2025, 1, 1)));
        assert!(sub.period_contains(ts(2025, 2, 1)));
        assert!(!sub.period_contains(ts(2025, 2, 2)));
    }
}
