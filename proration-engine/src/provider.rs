//! Billing provider abstraction.
//!
//! A [`BillingProvider`] supplies subscriptions and plans to the engine and
//! persists a plan change once the user confirms a quote. The engine itself
//! never calls a provider; [`PlanChangeService`](crate::service::PlanChangeService)
//! wires the two together.
//!
//! [`InMemoryBillingProvider`] keeps everything in memory. It backs tests and
//! the CLI's catalog mode.

use std::{collections::HashMap, future::Future, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    error::{ProrationError, Result},
    models::{Plan, PlanId, Subscription, SubscriptionId},
    quote::ProrationQuote,
};

/// Source of billing data and sink for confirmed plan changes.
///
/// Implementors adapt a payment processor or a database. Every method is
/// async because real providers reach over the network.
pub trait BillingProvider: Send + Sync {
    /// Fetches a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::NotFound`] if the subscription does not exist.
    fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> impl Future<Output = Result<Subscription>> + Send;

    /// Fetches a plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::NotFound`] if the plan does not exist.
    fn plan(&self, id: &PlanId) -> impl Future<Output = Result<Plan>> + Send;

    /// Lists every plan in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    fn plans(&self) -> impl Future<Output = Result<Vec<Plan>>> + Send;

    /// Persists the plan change described by a confirmed quote and returns
    /// the updated subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::StaleQuote`] if the subscription or either plan
    /// changed since the quote was computed, or [`ProrationError::NotFound`] for
    /// unknown ids.
    fn apply_plan_change(
        &self,
        quote: &ProrationQuote,
    ) -> impl Future<Output = Result<Subscription>> + Send;
}

/// Serializable snapshot of plans and subscriptions.
///
/// # Examples
///
/// ```
/// use proration_engine::provider::Catalog;
///
/// let json = r#"{
///     "plans": [
///         {"id": "basic", "name": "Basic", "price": "20.00", "currency": "USD", "interval": "month"}
///     ],
///     "subscriptions": [
///         {
///             "id": "sub_1",
///             "plan_id": "basic",
///             "current_period_start": "2025-04-01T00:00:00Z",
///             "current_period_end": "2025-05-01T00:00:00Z"
///         }
///     ]
/// }"#;
///
/// let catalog: Catalog = serde_json::from_str(json).unwrap();
/// assert_eq!(catalog.plans.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Available plans.
    #[serde(default)]
    pub plans: Vec<Plan>,
    /// Known subscriptions.
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Default)]
struct State {
    plans: HashMap<PlanId, Plan>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    applied: Vec<ProrationQuote>,
}

/// In-memory [`BillingProvider`].
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingProvider {
    state: Arc<RwLock<State>>,
}

impl InMemoryBillingProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider pre-populated from a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPlan`] for malformed or duplicate plans,
    /// [`ProrationError::InvalidPeriod`] for reversed subscription periods, and
    /// [`ProrationError::NotFound`] if a subscription references an unknown plan.
    pub fn from_catalog(catalog: Catalog) -> Result<Self> {
        let mut state = State::default();

        for plan in catalog.plans {
            plan.validate()?;
            if state.plans.contains_key(&plan.id) {
                return Err(ProrationError::InvalidPlan(format!(
                    "plan {} is listed twice in the catalog",
                    plan.id
                )));
            }
            state.plans.insert(plan.id.clone(), plan);
        }

        for subscription in catalog.subscriptions {
            subscription.validate()?;
            if !state.plans.contains_key(&subscription.plan_id) {
                return Err(ProrationError::NotFound(format!(
                    "plan {} referenced by subscription {}",
                    subscription.plan_id, subscription.id
                )));
            }
            state.subscriptions.insert(subscription.id.clone(), subscription);
        }

        Ok(Self { state: Arc::new(RwLock::new(state)) })
    }

    /// Parses a JSON [`Catalog`] and builds a provider from it.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::SerializationError`] on malformed JSON, otherwise
    /// see [`InMemoryBillingProvider::from_catalog`].
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        Self::from_catalog(catalog)
    }

    /// Adds or replaces a plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPlan`] if the plan is malformed.
    pub async fn insert_plan(&self, plan: Plan) -> Result<()> {
        plan.validate()?;
        self.state.write().await.plans.insert(plan.id.clone(), plan);
        Ok(())
    }

    /// Adds or replaces a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidPeriod`] if the period is reversed.
    pub async fn insert_subscription(&self, subscription: Subscription) -> Result<()> {
        subscription.validate()?;
        self.state.write().await.subscriptions.insert(subscription.id.clone(), subscription);
        Ok(())
    }

    /// Returns every quote applied so far, oldest first.
    pub async fn applied_changes(&self) -> Vec<ProrationQuote> {
        self.state.read().await.applied.clone()
    }
}

impl BillingProvider for InMemoryBillingProvider {
    async fn subscription(&self, id: &SubscriptionId) -> Result<Subscription> {
        self.state
            .read()
            .await
            .subscriptions
            .get(id)
            .cloned()
            .ok_or_else(|| ProrationError::NotFound(format!("subscription {id}")))
    }

    async fn plan(&self, id: &PlanId) -> Result<Plan> {
        self.state
            .read()
            .await
            .plans
            .get(id)
            .cloned()
            .ok_or_else(|| ProrationError::NotFound(format!("plan {id}")))
    }

    async fn plans(&self) -> Result<Vec<Plan>> {
        let mut plans: Vec<Plan> = self.state.read().await.plans.values().cloned().collect();
        plans.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(plans)
    }

    async fn apply_plan_change(&self, quote: &ProrationQuote) -> Result<Subscription> {
        let mut state = self.state.write().await;

        for quoted in [&quote.current_plan, &quote.new_plan] {
            let stored = state
                .plans
                .get(&quoted.id)
                .ok_or_else(|| ProrationError::NotFound(format!("plan {}", quoted.id)))?;
            if stored != quoted {
                return Err(ProrationError::StaleQuote(format!(
                    "plan {} changed after the quote was computed",
                    quoted.id
                )));
            }
        }

        let subscription = state.subscriptions.get_mut(&quote.subscription_id).ok_or_else(|| {
            ProrationError::NotFound(format!("subscription {}", quote.subscription_id))
        })?;

        if subscription.plan_id != quote.current_plan.id {
            return Err(ProrationError::StaleQuote(format!(
                "subscription {} moved to plan {} after the quote was computed",
                subscription.id, subscription.plan_id
            )));
        }
        if subscription.current_period_end != quote.next_billing_date {
            return Err(ProrationError::StaleQuote(format!(
                "subscription {} renewed after the quote was computed",
                subscription.id
            )));
        }

        subscription.plan_id = quote.new_plan.id.clone();
        let updated = subscription.clone();
        state.applied.push(quote.clone());

        info!(
            subscription_id = %updated.id,
            from_plan = %quote.current_plan.id,
            to_plan = %quote.new_plan.id,
            total = %quote.total,
            currency = %quote.currency,
            "applied plan change"
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{models::BillingInterval, money::Currency};

    fn catalog() -> Catalog {
        let usd = Currency::new("USD").unwrap();
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        Catalog {
            plans: vec![
                Plan::new(
                    PlanId::new("pro").unwrap(),
                    "Pro",
                    dec!(50),
                    usd.clone(),
                    BillingInterval::Month,
                ),
                Plan::new(
                    PlanId::new("basic").unwrap(),
                    "Basic",
                    dec!(20),
                    usd,
                    BillingInterval::Month,
                ),
            ],
            subscriptions: vec![
                Subscription::new(
                    SubscriptionId::new("sub_1").unwrap(),
                    PlanId::new("basic").unwrap(),
                    start,
                    end,
                )
                .unwrap(),
            ],
        }
    }

    #[tokio::test]
    async fn test_lookup_existing() {
        let provider = InMemoryBillingProvider::from_catalog(catalog()).unwrap();
        let sub = provider.subscription(&SubscriptionId::new("sub_1").unwrap()).await.unwrap();
        assert_eq!(sub.plan_id.as_str(), "basic");

        let plan = provider.plan(&PlanId::new("pro").unwrap()).await.unwrap();
        assert_eq!(plan.price, dec!(50));
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let provider = InMemoryBillingProvider::new();
        let result = provider.plan(&PlanId::new("ghost").unwrap()).await;
        assert!(matches!(result, Err(ProrationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_plans_sorted_by_id() {
        let provider = InMemoryBillingProvider::from_catalog(catalog()).unwrap();
        let ids: Vec<String> =
            provider.plans().await.unwrap().into_iter().map(|p| p.id.to_string()).collect();
        assert_eq!(ids, vec!["basic", "pro"]);
    }

    #[test]
    fn test_from_catalog_rejects_duplicate_plan() {
        let mut catalog = catalog();
        let duplicate = catalog.plans[0].clone();
        catalog.plans.push(duplicate);
        let result = InMemoryBillingProvider::from_catalog(catalog);
        assert!(matches!(result, Err(ProrationError::InvalidPlan(_))));
    }

    #[test]
    fn test_from_catalog_rejects_unknown_plan_reference() {
        let mut catalog = catalog();
        catalog.plans.retain(|p| p.id.as_str() != "basic");
        let result = InMemoryBillingProvider::from_catalog(catalog);
        assert!(matches!(result, Err(ProrationError::NotFound(_))));
    }

    #[test]
    fn test_from_json_malformed() {
        let result = InMemoryBillingProvider::from_json("{ not json");
        assert!(matches!(result, Err(ProrationError::SerializationError(_))));
    }

    async fn quote_for_upgrade(provider: &InMemoryBillingProvider) -> ProrationQuote {
        let subscription =
            provider.subscription(&SubscriptionId::new("sub_1").unwrap()).await.unwrap();
        let basic = provider.plan(&PlanId::new("basic").unwrap()).await.unwrap();
        let pro = provider.plan(&PlanId::new("pro").unwrap()).await.unwrap();
        crate::quote::compute_proration_quote(
            &subscription,
            &basic,
            &pro,
            subscription.current_period_start,
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_rejects_repriced_new_plan() {
        let provider = InMemoryBillingProvider::from_catalog(catalog()).unwrap();
        let quote = quote_for_upgrade(&provider).await;

        let mut repriced = quote.new_plan.clone();
        repriced.price = dec!(80);
        provider.insert_plan(repriced).await.unwrap();

        let result = provider.apply_plan_change(&quote).await;
        assert!(matches!(result, Err(ProrationError::StaleQuote(_))));
        assert!(provider.applied_changes().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_rejects_repriced_current_plan() {
        let provider = InMemoryBillingProvider::from_catalog(catalog()).unwrap();
        let quote = quote_for_upgrade(&provider).await;

        let mut repriced = quote.current_plan.clone();
        repriced.price = dec!(25);
        provider.insert_plan(repriced).await.unwrap();

        let result = provider.apply_plan_change(&quote).await;
        assert!(matches!(result, Err(ProrationError::StaleQuote(_))));
    }

    #[tokio::test]
    async fn test_apply_accepts_unchanged_plans() {
        let provider = InMemoryBillingProvider::from_catalog(catalog()).unwrap();
        let quote = quote_for_upgrade(&provider).await;

        let updated = provider.apply_plan_change(&quote).await.unwrap();
        assert_eq!(updated.plan_id.as_str(), "pro");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let provider = InMemoryBillingProvider::new();
        let clone = provider.clone();
        let plan = catalog().plans.remove(0);
        clone.insert_plan(plan.clone()).await.unwrap();
        assert_eq!(provider.plan(&plan.id).await.unwrap(), plan);
    }
}
