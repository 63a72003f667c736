//! Process-wide logging setup.
//!
//! Library code logs through the `log` facade and `tracing` spans. The owning
//! process calls [`init_logging`] once; `log` records are forwarded into the
//! tracing subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::ReportqError;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. Fails if a subscriber or logger is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ReportqError> {
    let filter = build_filter(config)?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ReportqError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| ReportqError::Logging(e.to_string()))?;

    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ReportqError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ReportqError::Logging(format!("invalid log level '{}': {}", config.level, e))),
    }
}
