//! Command handlers and output rendering.
//!
//! Each handler returns the text to print so that it can be tested without
//! capturing stdout.

use std::{fs, path::Path};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use proration_engine::{
    BillingProvider, Coupon, EngineConfig, InMemoryBillingProvider, Plan, PlanChangeRequest,
    PlanChangeService, PlanDifference, PlanId, ProrationEngine, ProrationQuote, Subscription,
    SubscriptionId, Tax, calculate_plan_difference, format_currency_with_scale,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

const LABEL_WIDTH: usize = 34;
const AMOUNT_WIDTH: usize = 14;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned, human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Input document for `proration quote`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteInput {
    /// Subscription being changed.
    pub subscription: Subscription,
    /// Plan the subscription is on.
    pub current_plan: Plan,
    /// Plan to switch to.
    pub new_plan: Plan,
    /// When the change takes effect; defaults to now.
    #[serde(default)]
    pub change_date: Option<DateTime<Utc>>,
    /// Optional discount.
    #[serde(default)]
    pub coupon: Option<Coupon>,
    /// Optional tax.
    #[serde(default)]
    pub tax: Option<Tax>,
}

/// Input document for `proration compare`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareInput {
    /// Plan the subscription is on.
    pub current_plan: Plan,
    /// Plan being considered.
    pub new_plan: Plan,
}

/// Arguments for `proration preview`.
#[derive(Debug, Clone)]
pub struct PreviewArgs {
    /// Subscription to change.
    pub subscription: String,
    /// Target plan.
    pub plan: String,
    /// Change date; defaults to now.
    pub at: Option<DateTime<Utc>>,
    /// Percent coupon as a fraction.
    pub percent_off: Option<Decimal>,
    /// Fixed coupon in major units.
    pub amount_off: Option<Decimal>,
    /// Tax rate as a fraction.
    pub tax_rate: Option<Decimal>,
}

/// Reads and parses a JSON document.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("cannot parse {}", path.display()))
}

/// Computes a quote from a self-contained input document.
pub fn quote(
    engine: &ProrationEngine,
    input: &QuoteInput,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let change_date = input.change_date.unwrap_or(now);
    debug!(%change_date, "quoting from input document");

    let quote = engine
        .compute_proration_quote(
            &input.subscription,
            &input.current_plan,
            &input.new_plan,
            change_date,
            input.coupon.as_ref(),
            input.tax.as_ref(),
        )
        .context("cannot compute quote")?;

    render_quote(&quote, engine.config(), format)
}

/// Previews a plan change against a catalog.
pub async fn preview(
    engine: ProrationEngine,
    catalog_json: &str,
    args: &PreviewArgs,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let provider =
        InMemoryBillingProvider::from_json(catalog_json).context("cannot load catalog")?;
    debug!(plans = provider.plans().await?.len(), "catalog loaded");

    let mut request = PlanChangeRequest::new(
        SubscriptionId::new(args.subscription.as_str())?,
        PlanId::new(args.plan.as_str())?,
        args.at.unwrap_or(now),
    );
    request.coupon = coupon_from_args(args.percent_off, args.amount_off)?;
    request.tax = args.tax_rate.map(Tax::new).transpose()?;

    let config = engine.config().clone();
    let service = PlanChangeService::new(provider, engine);
    let quote = service.preview(&request).await.context("cannot preview plan change")?;

    render_quote(&quote, &config, format)
}

/// Classifies a plan change as an upgrade, downgrade or lateral move.
pub fn compare(
    input: &CompareInput,
    config: &EngineConfig,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let difference = calculate_plan_difference(&input.current_plan, &input.new_plan)
        .context("cannot compare plans")?;

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&difference)?),
        OutputFormat::Text => Ok(render_difference(input, &difference, config)),
    }
}

fn coupon_from_args(
    percent_off: Option<Decimal>,
    amount_off: Option<Decimal>,
) -> anyhow::Result<Option<Coupon>> {
    match (percent_off, amount_off) {
        (Some(_), Some(_)) => anyhow::bail!("--percent-off and --amount-off are exclusive"),
        (Some(value), None) => Ok(Some(Coupon::percent(value)?)),
        (None, Some(value)) => Ok(Some(Coupon::fixed(value)?)),
        (None, None) => Ok(None),
    }
}

/// Renders a quote in the requested format.
///
/// Text amounts use the same minor-unit scale as the quote itself, so a
/// `[minor_units]` override in `config` shows up in both formats.
pub fn render_quote(
    quote: &ProrationQuote,
    config: &EngineConfig,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(quote)?),
        OutputFormat::Text => Ok(render_quote_text(quote, config.scale_for(&quote.currency))),
    }
}

fn render_quote_text(quote: &ProrationQuote, scale: u32) -> String {
    let money = |amount: Decimal| format_currency_with_scale(amount, &quote.currency, scale);
    let mut out = format!(
        "{} -> {} (subscription {})\nEffective {}\nNext billing {}\n\n",
        quote.current_plan.name,
        quote.new_plan.name,
        quote.subscription_id,
        quote.change_date.to_rfc3339(),
        quote.next_billing_date.to_rfc3339(),
    );

    if quote.adjustments.is_empty() {
        out.push_str(&format!("No change: already on {}\n", quote.new_plan.name));
    }
    for adjustment in &quote.adjustments {
        out.push_str(&line(&adjustment.description, &money(adjustment.signed_amount())));
    }
    out.push_str(&line("Subtotal", &money(quote.subtotal)));
    if !quote.coupon_discount.is_zero() {
        out.push_str(&line("Coupon", &money(-quote.coupon_discount)));
    }
    if !quote.tax_amount.is_zero() {
        out.push_str(&line("Tax", &money(quote.tax_amount)));
    }

    let label = if quote.is_credit() { "Total credit" } else { "Total due" };
    out.push_str(&line(label, &money(quote.total)));
    out
}

fn render_difference(
    input: &CompareInput,
    difference: &PlanDifference,
    config: &EngineConfig,
) -> String {
    let currency = &input.current_plan.currency;
    let scale = config.scale_for(currency);
    let money = |amount: Decimal| format_currency_with_scale(amount, currency, scale);

    let mut out =
        format!("{} -> {}: {}\n", input.current_plan.name, input.new_plan.name, difference.kind);
    out.push_str(&line("Current monthly", &money(difference.current_monthly)));
    out.push_str(&line("New monthly", &money(difference.new_monthly)));
    out.push_str(&line("Monthly change", &money(difference.monthly_delta)));
    out
}

fn line(label: &str, amount: &str) -> String {
    format!("  {label:<LABEL_WIDTH$}{amount:>AMOUNT_WIDTH$}\n")
}
