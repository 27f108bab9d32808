//! Proration quotes for plan changes.
//!
//! [`ProrationEngine`] turns a subscription, its current plan, a target plan,
//! a change date, and an optional coupon and tax into an immutable
//! [`ProrationQuote`]. The engine holds only configuration; every call is a
//! pure function of its arguments.
//!
//! # Algorithm
//!
//! 1. The change date is mapped onto the current period
//!    ([`resolve_change_date`](crate::proration::resolve_change_date)).
//! 2. `remaining = (period_end - change) / (period_end - period_start)`, clamped to `[0, 1]`.
//! 3. Credit `current.price × remaining`, charge `new.price × remaining`.
//! 4. `subtotal = charge - credit`, then the coupon, then tax on the
//!    non-negative remainder.
//! 5. Every amount is rounded to the currency's minor units with the
//!    configured [`RoundingMode`](crate::money::RoundingMode), so
//!    `total == charge - credit - coupon_discount + tax_amount` holds exactly.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    config::EngineConfig,
    discount::{Coupon, Tax},
    error::{ProrationError, Result},
    models::{Plan, Subscription, SubscriptionId},
    money::{Currency, round_amount},
    proration::{next_billing_date, remaining_fraction, resolve_change_date},
};

/// Direction of a quote line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Amount owed by the customer.
    Charge,
    /// Amount returned to the customer.
    Credit,
}

/// Single line in a proration quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Human-readable description.
    pub description: String,
    /// Non-negative amount, rounded to the currency's minor units.
    pub amount: Decimal,
    /// Whether the amount is charged or credited.
    pub kind: AdjustmentKind,
}

impl Adjustment {
    /// Returns the amount signed by kind (charges positive, credits negative).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            AdjustmentKind::Charge => self.amount,
            AdjustmentKind::Credit => -self.amount,
        }
    }
}

/// Result of a proration calculation, shown to the user before confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProrationQuote {
    /// Subscription the quote applies to.
    pub subscription_id: SubscriptionId,
    /// Plan the subscription is moving away from.
    pub current_plan: Plan,
    /// Plan the subscription is moving to.
    pub new_plan: Plan,
    /// Effective change date, after mapping onto the current period.
    pub change_date: DateTime<Utc>,
    /// Next renewal, which bills the new plan's full price.
    pub next_billing_date: DateTime<Utc>,
    /// Share of the current period left at the change date.
    pub remaining_fraction: Decimal,
    /// Ordered quote lines: credit for the current plan, then charge for the new one.
    pub adjustments: Vec<Adjustment>,
    /// Sum of signed adjustments.
    pub subtotal: Decimal,
    /// Discount taken off a positive subtotal.
    pub coupon_discount: Decimal,
    /// Tax on the discounted, non-negative subtotal.
    pub tax_amount: Decimal,
    /// Net amount: positive is owed, negative is credited.
    pub total: Decimal,
    /// Currency of every amount in the quote.
    pub currency: Currency,
}

impl ProrationQuote {
    /// Returns the sum of signed adjustments.
    #[must_use]
    pub fn net_adjustments(&self) -> Decimal {
        self.adjustments.iter().map(Adjustment::signed_amount).sum()
    }

    /// Returns the total of all credit lines.
    #[must_use]
    pub fn credit_amount(&self) -> Decimal {
        self.sum_of(AdjustmentKind::Credit)
    }

    /// Returns the total of all charge lines.
    #[must_use]
    pub fn charge_amount(&self) -> Decimal {
        self.sum_of(AdjustmentKind::Charge)
    }

    /// Returns whether the customer owes money.
    #[must_use]
    pub fn is_charge(&self) -> bool {
        self.total > Decimal::ZERO
    }

    /// Returns whether the customer is owed money.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.total < Decimal::ZERO
    }

    /// Returns whether the change is free of charge.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.total.is_zero()
    }

    /// Amount to collect now (zero for credits).
    #[must_use]
    pub fn amount_due(&self) -> Decimal {
        self.total.max(Decimal::ZERO)
    }

    /// Amount to keep as account balance (zero for charges).
    #[must_use]
    pub fn credit_balance(&self) -> Decimal {
        (-self.total).max(Decimal::ZERO)
    }

    fn sum_of(&self, kind: AdjustmentKind) -> Decimal {
        self.adjustments.iter().filter(|a| a.kind == kind).map(|a| a.amount).sum()
    }
}

/// Classification of a plan change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeKind {
    /// The new plan costs more per month.
    Upgrade,
    /// The new plan costs less per month.
    Downgrade,
    /// Both plans cost the same per month.
    Lateral,
}

impl PlanChangeKind {
    /// Returns the lowercase name used in serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
            Self::Lateral => "lateral",
        }
    }
}

impl fmt::Display for PlanChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price comparison between two plans, normalized to one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDifference {
    /// Upgrade, downgrade, or lateral move.
    pub kind: PlanChangeKind,
    /// Monthly-equivalent price of the current plan.
    pub current_monthly: Decimal,
    /// Monthly-equivalent price of the new plan.
    pub new_monthly: Decimal,
    /// `new_monthly - current_monthly`.
    pub monthly_delta: Decimal,
}

/// Computes proration quotes with a fixed configuration.
///
/// The engine is cheap to clone and holds no per-call state, so a single
/// instance can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct ProrationEngine {
    config: EngineConfig,
}

impl ProrationEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Computes the quote for switching `subscription` from `current_plan` to `new_plan`.
    ///
    /// Switching to the same plan yields a quote with no adjustments and a
    /// zero total, whatever the change date.
    ///
    /// # Errors
    ///
    /// - [`ProrationError::CurrencyMismatch`] if the plans use different currencies
    /// - [`ProrationError::InvalidPlan`] if a plan is malformed, the subscription is not on
    ///   `current_plan`, or two plans share an id but differ
    /// - [`ProrationError::InvalidPeriod`] if the subscription period is reversed
    /// - [`ProrationError::InvalidChangeDate`] if the change date is rejected by the
    ///   configured [`ChangeDatePolicy`](crate::config::ChangeDatePolicy)
    /// - [`ProrationError::InvalidCoupon`] / [`ProrationError::InvalidTax`] for out-of-range
    ///   discounts or rates
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use proration_engine::{
    ///     models::{BillingInterval, Plan, PlanId, Subscription, SubscriptionId},
    ///     money::Currency,
    ///     quote::ProrationEngine,
    /// };
    /// use rust_decimal::Decimal;
    ///
    /// # fn example() -> proration_engine::Result<()> {
    /// let usd = Currency::new("USD")?;
    /// let basic = Plan::new(PlanId::new("basic")?, "Basic", Decimal::new(2000, 2), usd.clone(), BillingInterval::Month);
    /// let pro = Plan::new(PlanId::new("pro")?, "Pro", Decimal::new(5000, 2), usd, BillingInterval::Month);
    ///
    /// let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
    /// let subscription = Subscription::new(
    ///     SubscriptionId::new("sub_1")?,
    ///     basic.id.clone(),
    ///     start,
    ///     start + Duration::days(30),
    /// )?;
    ///
    /// let engine = ProrationEngine::default();
    /// let quote = engine.compute_proration_quote(
    ///     &subscription,
    ///     &basic,
    ///     &pro,
    ///     start + Duration::days(15),
    ///     None,
    ///     None,
    /// )?;
    ///
    /// assert_eq!(quote.total, Decimal::new(1500, 2));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            subscription_id = %subscription.id,
            current_plan = %current_plan.id,
            new_plan = %new_plan.id,
        )
    )]
    pub fn compute_proration_quote(
        &self,
        subscription: &Subscription,
        current_plan: &Plan,
        new_plan: &Plan,
        change_date: DateTime<Utc>,
        coupon: Option<&Coupon>,
        tax: Option<&Tax>,
    ) -> Result<ProrationQuote> {
        validate_inputs(subscription, current_plan, new_plan, coupon, tax)?;

        let currency = current_plan.currency.clone();
        let zero = self.round(Decimal::ZERO, &currency);

        if current_plan.id == new_plan.id {
            if current_plan != new_plan {
                return Err(ProrationError::InvalidPlan(format!(
                    "plan {} has two different definitions",
                    current_plan.id
                )));
            }
            debug!("same plan requested, no proration");
            let effective = change_date
                .clamp(subscription.current_period_start, subscription.current_period_end);
            return Ok(ProrationQuote {
                subscription_id: subscription.id.clone(),
                current_plan: current_plan.clone(),
                new_plan: new_plan.clone(),
                change_date: effective,
                next_billing_date: next_billing_date(subscription),
                remaining_fraction: remaining_fraction(
                    subscription.current_period_start,
                    subscription.current_period_end,
                    effective,
                ),
                adjustments: Vec::new(),
                subtotal: zero,
                coupon_discount: zero,
                tax_amount: zero,
                total: zero,
                currency,
            });
        }

        let effective = resolve_change_date(
            subscription,
            current_plan,
            change_date,
            self.config.change_date_policy,
        )?;
        let fraction = remaining_fraction(
            subscription.current_period_start,
            subscription.current_period_end,
            effective,
        );

        let credit = self.round(checked_mul(current_plan.price, fraction, "credit")?, &currency);
        let charge = self.round(checked_mul(new_plan.price, fraction, "charge")?, &currency);
        let adjustments = vec![
            Adjustment {
                description: format!("Unused time on {}", current_plan.name),
                amount: credit,
                kind: AdjustmentKind::Credit,
            },
            Adjustment {
                description: format!("Prorated charge for {}", new_plan.name),
                amount: charge,
                kind: AdjustmentKind::Charge,
            },
        ];

        let subtotal = checked_sub(charge, credit, "subtotal")?;
        let coupon_discount = match coupon {
            Some(coupon) => self.round(coupon.discount_for(subtotal)?, &currency),
            None => zero,
        };
        let discounted = checked_sub(subtotal, coupon_discount, "discounted subtotal")?;
        let tax_amount = match tax {
            Some(tax) => self.round(tax.tax_for(discounted)?, &currency),
            None => zero,
        };
        let total = self.round(
            discounted.checked_add(tax_amount).ok_or_else(|| overflow("total"))?,
            &currency,
        );

        debug!(
            remaining_fraction = %fraction,
            %credit,
            %charge,
            %coupon_discount,
            %tax_amount,
            %total,
            "computed proration quote"
        );

        Ok(ProrationQuote {
            subscription_id: subscription.id.clone(),
            current_plan: current_plan.clone(),
            new_plan: new_plan.clone(),
            change_date: effective,
            next_billing_date: next_billing_date(subscription),
            remaining_fraction: fraction,
            adjustments,
            subtotal,
            coupon_discount,
            tax_amount,
            total,
            currency,
        })
    }

    fn round(&self, amount: Decimal, currency: &Currency) -> Decimal {
        round_amount(amount, self.config.scale_for(currency), self.config.rounding)
    }
}

fn validate_inputs(
    subscription: &Subscription,
    current_plan: &Plan,
    new_plan: &Plan,
    coupon: Option<&Coupon>,
    tax: Option<&Tax>,
) -> Result<()> {
    current_plan.validate()?;
    new_plan.validate()?;
    subscription.validate()?;

    if subscription.plan_id != current_plan.id {
        return Err(ProrationError::InvalidPlan(format!(
            "subscription {} is on plan {}, not {}",
            subscription.id, subscription.plan_id, current_plan.id
        )));
    }
    if current_plan.currency != new_plan.currency {
        return Err(ProrationError::CurrencyMismatch {
            current: current_plan.currency.code().to_owned(),
            new: new_plan.currency.code().to_owned(),
        });
    }
    if let Some(coupon) = coupon {
        coupon.validate()?;
    }
    if let Some(tax) = tax {
        tax.validate()?;
    }
    Ok(())
}

fn checked_mul(amount: Decimal, fraction: Decimal, what: &str) -> Result<Decimal> {
    amount.checked_mul(fraction).ok_or_else(|| overflow(what))
}

fn checked_sub(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(what))
}

fn overflow(what: &str) -> ProrationError {
    ProrationError::ArithmeticOverflow(format!("overflow in {what} calculation"))
}

/// Computes a quote with the default engine configuration.
///
/// Equivalent to `ProrationEngine::default().compute_proration_quote(..)`.
///
/// # Errors
///
/// See [`ProrationEngine::compute_proration_quote`].
pub fn compute_proration_quote(
    subscription: &Subscription,
    current_plan: &Plan,
    new_plan: &Plan,
    change_date: DateTime<Utc>,
    coupon: Option<&Coupon>,
    tax: Option<&Tax>,
) -> Result<ProrationQuote> {
    ProrationEngine::default().compute_proration_quote(
        subscription,
        current_plan,
        new_plan,
        change_date,
        coupon,
        tax,
    )
}

/// Classifies a plan change by comparing monthly-equivalent prices.
///
/// Purely informational; drives upgrade and downgrade badges.
///
/// # Errors
///
/// Returns [`ProrationError::CurrencyMismatch`] if the plans use different currencies, or
/// [`ProrationError::InvalidPlan`] if either plan is malformed.
///
/// # Examples
///
/// ```
/// use proration_engine::{
///     models::{BillingInterval, Plan, PlanId},
///     money::Currency,
///     quote::{PlanChangeKind, calculate_plan_difference},
/// };
/// use rust_decimal::Decimal;
///
/// let usd = Currency::new("USD").unwrap();
/// let monthly = Plan::new(PlanId::new("m").unwrap(), "Monthly", Decimal::from(20), usd.clone(), BillingInterval::Month);
/// let annual = Plan::new(PlanId::new("y").unwrap(), "Annual", Decimal::from(200), usd, BillingInterval::Year);
///
/// let diff = calculate_plan_difference(&monthly, &annual).unwrap();
/// assert_eq!(diff.kind, PlanChangeKind::Downgrade);
/// ```
pub fn calculate_plan_difference(current_plan: &Plan, new_plan: &Plan) -> Result<PlanDifference> {
    current_plan.validate()?;
    new_plan.validate()?;
    if current_plan.currency != new_plan.currency {
        return Err(ProrationError::CurrencyMismatch {
            current: current_plan.currency.code().to_owned(),
            new: new_plan.currency.code().to_owned(),
        });
    }

    let current_monthly = current_plan.monthly_equivalent()?;
    let new_monthly = new_plan.monthly_equivalent()?;
    let kind = match new_monthly.cmp(&current_monthly) {
        std::cmp::Ordering::Greater => PlanChangeKind::Upgrade,
        std::cmp::Ordering::Less => PlanChangeKind::Downgrade,
        std::cmp::Ordering::Equal => PlanChangeKind::Lateral,
    };

    Ok(PlanDifference {
        kind,
        current_monthly,
        new_monthly,
        monthly_delta: checked_sub(new_monthly, current_monthly, "monthly delta")?,
    })
}
