//! `proration` - compute plan-change quotes from the command line.
//!
//! ```text
//! proration quote --input change.json
//! proration preview --catalog catalog.json --subscription sub_1 --plan pro --at 2025-04-16T00:00:00Z
//! proration compare --input plans.json --format json
//! ```
//!
//! Results go to stdout; logs go to stderr (`RUST_LOG`, `LOG_FORMAT`).

mod commands;
mod observability;

use std::{fs, path::PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use proration_engine::{EngineConfig, ProrationEngine};
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    commands::{CompareInput, OutputFormat, PreviewArgs, QuoteInput},
    observability::{LogFormat, init_observability},
};

#[derive(Parser, Debug)]
#[command(name = "proration")]
#[command(version, about = "Compute proration quotes for subscription plan changes", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Log format; overrides LOG_FORMAT
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quote a plan change described in a JSON document
    Quote {
        /// Document with subscription, current_plan, new_plan and optional
        /// change_date, coupon and tax
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Preview a plan change for a subscription in a catalog
    Preview {
        /// JSON catalog of plans and subscriptions
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Subscription ID
        #[arg(long, value_name = "ID")]
        subscription: String,

        /// Target plan ID
        #[arg(long, value_name = "ID")]
        plan: String,

        /// Change date (RFC 3339); defaults to now
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<DateTime<Utc>>,

        /// Percent coupon as a fraction (0.2 is 20% off)
        #[arg(long, value_name = "FRACTION", conflicts_with = "amount_off")]
        percent_off: Option<Decimal>,

        /// Fixed coupon in major currency units
        #[arg(long, value_name = "AMOUNT")]
        amount_off: Option<Decimal>,

        /// Tax rate as a fraction (0.0825 is 8.25%)
        #[arg(long, value_name = "FRACTION")]
        tax_rate: Option<Decimal>,
    },

    /// Classify a plan change as upgrade, downgrade or lateral
    Compare {
        /// Document with current_plan and new_plan
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
}

fn load_engine(config: Option<&PathBuf>) -> anyhow::Result<ProrationEngine> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("cannot load engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(ProrationEngine::new(config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_observability(cli.log_format.unwrap_or_else(LogFormat::from_env))?;

    let engine = load_engine(cli.config.as_ref())?;
    info!(
        change_date_policy = ?engine.config().change_date_policy,
        rounding = ?engine.config().rounding,
        "engine configured"
    );

    let now = Utc::now();
    let output = match cli.command {
        Command::Quote { input } => {
            let input: QuoteInput = commands::read_json(&input)?;
            commands::quote(&engine, &input, now, cli.format)?
        }
        Command::Preview {
            catalog,
            subscription,
            plan,
            at,
            percent_off,
            amount_off,
            tax_rate,
        } => {
            let catalog_json = fs::read_to_string(&catalog)
                .with_context(|| format!("cannot read {}", catalog.display()))?;
            let args = PreviewArgs { subscription, plan, at, percent_off, amount_off, tax_rate };
            commands::preview(engine, &catalog_json, &args, now, cli.format).await?
        }
        Command::Compare { input } => {
            let input: CompareInput = commands::read_json(&input)?;
            commands::compare(&input, engine.config(), cli.format)?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_preview() {
        let cli = Cli::try_parse_from([
            "proration",
            "preview",
            "--catalog",
            "catalog.json",
            "--subscription",
            "sub_1",
            "--plan",
            "pro",
            "--at",
            "2025-04-16T00:00:00Z",
            "--tax-rate",
            "0.1",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Preview { subscription, plan, at, tax_rate, percent_off, .. } => {
                assert_eq!(subscription, "sub_1");
                assert_eq!(plan, "pro");
                assert_eq!(at.unwrap().to_rfc3339(), "2025-04-16T00:00:00+00:00");
                assert_eq!(tax_rate, Some(Decimal::new(1, 1)));
                assert!(percent_off.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_coupon_flags_conflict() {
        let result = Cli::try_parse_from([
            "proration",
            "preview",
            "--catalog",
            "c.json",
            "--subscription",
            "sub_1",
            "--plan",
            "pro",
            "--percent-off",
            "0.1",
            "--amount-off",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let path = PathBuf::from("/nonexistent/engine.toml");
        let result = load_engine(Some(&path));
        assert!(result.is_err());
    }
}
