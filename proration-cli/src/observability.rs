//! Logging setup for the `proration` binary.
//!
//! Logs go to stderr so that quotes printed on stdout stay machine-readable.

use std::io;

use clap::ValueEnum;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable pretty format for interactive use.
    Pretty,
    /// JSON format for log aggregation.
    Json,
}

impl LogFormat {
    /// Determines log format from the `LOG_FORMAT` environment variable.
    ///
    /// See [`LogFormat::from_value`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_value(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    /// Maps `json` (any case) to [`LogFormat::Json`]; anything else is pretty.
    #[must_use]
    pub fn from_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Initializes structured logging.
///
/// Configures tracing-subscriber with:
/// - Pretty or JSON output on stderr
/// - Environment-based log level filtering (`RUST_LOG`, default `info`)
/// - Span close events, which carry the timing of each preview and confirm
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_observability(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(io::stderr),
            )
            .try_init()?,
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}
