//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pick the filter from the environment, falling back to config
//!
//! # Design Decisions
//! - `RUST_LOG` wins over `observability.log_level`
//! - Full format for development, compact for dense production logs

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    let (full, compact) = match config.log_format {
        LogFormat::Full => (Some(fmt::layer()), None),
        LogFormat::Compact => (None, Some(fmt::layer().compact())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(full)
        .with(compact)
        .try_init()
}

fn default_filter(config: &ObservabilityConfig) -> EnvFilter {
    let level = &config.log_level;
    EnvFilter::new(format!("relay_gateway={level},tower_http={level}"))
}
