use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::{
    BillingInterval, Coupon, Currency, Plan, PlanId, Subscription, SubscriptionId, Tax,
    compute_proration_quote,
};

const PERIOD_SECONDS: i64 = 30 * 24 * 60 * 60;

fn period_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
}

fn plan(id: &str, cents: i64) -> Plan {
    Plan::new(
        PlanId::new(id).unwrap(),
        id,
        Decimal::new(cents, 2),
        Currency::new("USD").unwrap(),
        BillingInterval::Month,
    )
}

fn subscription(plan: &Plan) -> Subscription {
    Subscription::new(
        SubscriptionId::new("sub_prop").unwrap(),
        plan.id.clone(),
        period_start(),
        period_start() + Duration::seconds(PERIOD_SECONDS),
    )
    .unwrap()
}

fn coupon_strategy() -> impl Strategy<Value = Option<Coupon>> {
    prop_oneof![
        Just(None),
        (0u32..=100).prop_map(|pct| Some(Coupon::percent(Decimal::new(i64::from(pct), 2)).unwrap())),
        (0i64..100_000).prop_map(|cents| Some(Coupon::fixed(Decimal::new(cents, 2)).unwrap())),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_same_plan_is_always_free(
        cents in 0i64..1_000_000,
        offset in 0i64..=PERIOD_SECONDS,
        coupon in coupon_strategy(),
        rate in 0u32..=100,
    ) {
        let current = plan("basic", cents);
        let sub = subscription(&current);
        let tax = Tax::new(Decimal::new(i64::from(rate), 2)).unwrap();
        let change = period_start() + Duration::seconds(offset);

        let quote = compute_proration_quote(
            &sub, &current, &current, change, coupon.as_ref(), Some(&tax),
        ).unwrap();

        prop_assert_eq!(quote.total, Decimal::ZERO);
        prop_assert_eq!(quote.net_adjustments(), Decimal::ZERO);
    }

    #[test]
    fn test_total_identity_holds(
        current_cents in 0i64..1_000_000,
        new_cents in 0i64..1_000_000,
        offset in 0i64..=PERIOD_SECONDS,
        coupon in coupon_strategy(),
        rate in 0u32..=100,
    ) {
        let current = plan("basic", current_cents);
        let target = plan("pro", new_cents);
        let sub = subscription(&current);
        let tax = Tax::new(Decimal::new(i64::from(rate), 2)).unwrap();
        let change = period_start() + Duration::seconds(offset);

        let quote = compute_proration_quote(
            &sub, &current, &target, change, coupon.as_ref(), Some(&tax),
        ).unwrap();

        prop_assert_eq!(
            quote.total,
            quote.net_adjustments() - quote.coupon_discount + quote.tax_amount
        );
        prop_assert!(quote.remaining_fraction >= Decimal::ZERO);
        prop_assert!(quote.remaining_fraction <= Decimal::ONE);
        prop_assert!(quote.total.scale() <= 2);
    }

    #[test]
    fn test_coupon_never_overshoots_subtotal(
        current_cents in 0i64..1_000_000,
        new_cents in 0i64..1_000_000,
        offset in 0i64..=PERIOD_SECONDS,
        coupon in coupon_strategy(),
    ) {
        let current = plan("basic", current_cents);
        let target = plan("pro", new_cents);
        let sub = subscription(&current);
        let change = period_start() + Duration::seconds(offset);

        let quote = compute_proration_quote(
            &sub, &current, &target, change, coupon.as_ref(), None,
        ).unwrap();

        prop_assert!(quote.coupon_discount >= Decimal::ZERO);
        if quote.subtotal >= Decimal::ZERO {
            prop_assert!(quote.subtotal - quote.coupon_discount >= Decimal::ZERO);
        } else {
            prop_assert_eq!(quote.coupon_discount, Decimal::ZERO);
        }
    }

    #[test]
    fn test_higher_tax_never_lowers_total(
        current_cents in 0i64..1_000_000,
        new_cents in 0i64..1_000_000,
        offset in 0i64..=PERIOD_SECONDS,
        coupon in coupon_strategy(),
        low in 0u32..=100,
        bump in 0u32..=100,
    ) {
        let high = (low + bump).min(100);
        let current = plan("basic", current_cents);
        let target = plan("pro", new_cents);
        let sub = subscription(&current);
        let change = period_start() + Duration::seconds(offset);
        let low_tax = Tax::new(Decimal::new(i64::from(low), 2)).unwrap();
        let high_tax = Tax::new(Decimal::new(i64::from(high), 2)).unwrap();

        let low_quote = compute_proration_quote(
            &sub, &current, &target, change, coupon.as_ref(), Some(&low_tax),
        ).unwrap();
        let high_quote = compute_proration_quote(
            &sub, &current, &target, change, coupon.as_ref(), Some(&high_tax),
        ).unwrap();

        prop_assert!(high_quote.total >= low_quote.total);
    }

    #[test]
    fn test_period_boundaries(
        current_cents in 0i64..1_000_000,
        new_cents in 0i64..1_000_000,
    ) {
        let current = plan("basic", current_cents);
        let target = plan("pro", new_cents);
        let sub = subscription(&current);

        let at_end = compute_proration_quote(
            &sub, &current, &target, sub.current_period_end, None, None,
        ).unwrap();
        prop_assert_eq!(at_end.remaining_fraction, Decimal::ZERO);
        prop_assert_eq!(at_end.credit_amount(), Decimal::ZERO);
        prop_assert_eq!(at_end.charge_amount(), Decimal::ZERO);

        let at_start = compute_proration_quote(
            &sub, &current, &target, sub.current_period_start, None, None,
        ).unwrap();
        prop_assert_eq!(at_start.remaining_fraction, Decimal::ONE);
        prop_assert_eq!(at_start.credit_amount(), current.price);
        prop_assert_eq!(at_start.charge_amount(), target.price);
    }

    #[test]
    fn test_repeated_calls_are_identical(
        current_cents in 0i64..1_000_000,
        new_cents in 0i64..1_000_000,
        offset in 0i64..=PERIOD_SECONDS,
        coupon in coupon_strategy(),
    ) {
        let current = plan("basic", current_cents);
        let target = plan("pro", new_cents);
        let sub = subscription(&current);
        let change = period_start() + Duration::seconds(offset);

        let first = compute_proration_quote(
            &sub, &current, &target, change, coupon.as_ref(), None,
        ).unwrap();
        let second = compute_proration_quote(
            &sub, &current, &target, change, coupon.as_ref(), None,
        ).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_currency_mismatch_never_quotes(
        current_cents in 0i64..1_000_000,
        new_cents in 0i64..1_000_000,
        code in "EUR|GBP|JPY|CHF",
    ) {
        let current = plan("basic", current_cents);
        let mut target = plan("pro", new_cents);
        target.currency = Currency::new(&code).unwrap();
        let sub = subscription(&current);

        let result = compute_proration_quote(
            &sub, &current, &target, period_start(), None, None,
        );
        let is_mismatch =
            matches!(result, Err(crate::ProrationError::CurrencyMismatch { .. }));
        prop_assert!(is_mismatch);
    }
}
