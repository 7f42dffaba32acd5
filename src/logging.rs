//! Subscriber setup for applications built on workbench.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the binary. [`init`] wires up the usual one.

use crate::config::LoggingConfig;
use crate::error::{WorkError, WorkResult};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the configured level applies.
///
/// # Errors
///
/// Returns a configuration error if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> WorkResult<()> {
    let level = tracing::Level::from(config.level);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(config.include_targets))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(config.colored)
                    .with_target(config.include_targets),
            )
            .try_init()
    };

    result.map_err(|e| WorkError::config(format!("failed to install subscriber: {e}")))
}
