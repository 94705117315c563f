//! Diagnostic logging to stderr via `tracing`.
//!
//! Stdout is reserved for the report, so every layer writes to stderr.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::settings::{LogFormat, LoggingConfig};

/// Environment variable holding a full `EnvFilter` directive.
pub(crate) const LOG_ENV: &str = "PATH_LOOKUP_LOG";

/// Install the global subscriber. `PATH_LOOKUP_LOG` wins over the configured level.
pub(crate) fn init_logging(config: &LoggingConfig) -> Result<()> {
    let directive = std::env::var(LOG_ENV).ok();
    let filter = build_env_filter(directive.as_deref(), config)?;
    let registry = Registry::default().with(filter);
    let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    let result = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Text => registry.with(layer.with_ansi(false)).try_init(),
    };
    result.context("install tracing subscriber")
}

/// An empty or unset directive falls back to the configured level; an invalid
/// one is an error rather than being ignored.
fn build_env_filter(directive: Option<&str>, config: &LoggingConfig) -> Result<EnvFilter> {
    match directive.map(str::trim) {
        Some(directive) if !directive.is_empty() => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid {LOG_ENV} directive {directive:?}")),
        _ => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level {:?}", config.level)),
    }
}
