//! Plan-change workflow on top of a [`BillingProvider`].
//!
//! The presentation layer calls [`PlanChangeService::preview`] every time an
//! input changes, shows the returned quote, and calls
//! [`PlanChangeService::confirm`] when the user accepts it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    discount::{Coupon, Tax},
    error::Result,
    models::{PlanId, Subscription, SubscriptionId},
    provider::BillingProvider,
    quote::{ProrationEngine, ProrationQuote},
};

/// Inputs for previewing a plan change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChangeRequest {
    /// Subscription to change.
    pub subscription_id: SubscriptionId,
    /// Plan to switch to.
    pub new_plan_id: PlanId,
    /// When the change takes effect.
    pub change_date: DateTime<Utc>,
    /// Optional discount.
    #[serde(default)]
    pub coupon: Option<Coupon>,
    /// Optional tax.
    #[serde(default)]
    pub tax: Option<Tax>,
}

impl PlanChangeRequest {
    /// Creates a request without coupon or tax.
    #[must_use]
    pub const fn new(
        subscription_id: SubscriptionId,
        new_plan_id: PlanId,
        change_date: DateTime<Utc>,
    ) -> Self {
        Self { subscription_id, new_plan_id, change_date, coupon: None, tax: None }
    }

    /// Attaches a coupon.
    #[must_use]
    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupon = Some(coupon);
        self
    }

    /// Attaches a tax.
    #[must_use]
    pub fn with_tax(mut self, tax: Tax) -> Self {
        self.tax = Some(tax);
        self
    }
}

/// Resolves plan-change inputs through a provider and quotes them.
#[derive(Debug, Clone)]
pub struct PlanChangeService<P> {
    provider: P,
    engine: ProrationEngine,
}

impl<P: BillingProvider> PlanChangeService<P> {
    /// Creates a service over `provider`.
    #[must_use]
    pub const fn new(provider: P, engine: ProrationEngine) -> Self {
        Self { provider, engine }
    }

    /// Returns the underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetches the subscription and both plans, then computes a quote.
    ///
    /// Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns provider lookup errors ([`ProrationError::NotFound`](crate::ProrationError::NotFound))
    /// or any engine validation error.
    #[instrument(
        skip(self, request),
        fields(subscription_id = %request.subscription_id, new_plan_id = %request.new_plan_id)
    )]
    pub async fn preview(&self, request: &PlanChangeRequest) -> Result<ProrationQuote> {
        let subscription = self.provider.subscription(&request.subscription_id).await?;
        let current_plan = self.provider.plan(&subscription.plan_id).await?;
        let new_plan = self.provider.plan(&request.new_plan_id).await?;

        let quote = self.engine.compute_proration_quote(
            &subscription,
            &current_plan,
            &new_plan,
            request.change_date,
            request.coupon.as_ref(),
            request.tax.as_ref(),
        )?;

        info!(total = %quote.total, currency = %quote.currency, "previewed plan change");
        Ok(quote)
    }

    /// Hands an accepted quote to the provider for persistence.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::StaleQuote`](crate::ProrationError::StaleQuote) if the
    /// subscription changed after the quote was computed.
    #[instrument(skip(self, quote), fields(subscription_id = %quote.subscription_id))]
    pub async fn confirm(&self, quote: &ProrationQuote) -> Result<Subscription> {
        self.provider.apply_plan_change(quote).await
    }
}
