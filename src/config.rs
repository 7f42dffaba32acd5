//! Configuration types for workbench.
//!
//! The primitives themselves take plain values ([`QueueOptions`], an
//! interval); this module gathers them into one serde-friendly structure
//! that applications can load from JSON or from the environment.

use crate::core::Throttler;
use crate::env;
use crate::error::{WorkError, WorkResult};
use crate::queue::QueueOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest buffer a queue can be built with.
pub const MAX_QUEUE_SIZE: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Upper bound accepted by [`WorkConfig::validate`] for the worker count.
pub const MAX_WORKERS: usize = 1000;

/// Main configuration for workbench.
///
/// # Examples
///
/// ```rust
/// use workbench::config::{WorkConfig, ThrottleConfig};
/// use workbench::QueueOptions;
///
/// let config = WorkConfig {
///     queue: QueueOptions::default().with_workers(8),
///     throttle: ThrottleConfig { interval_ms: 500 },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Queue sizing
    pub queue: QueueOptions,

    /// Throttling of periodic actions
    pub throttle: ThrottleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Throttler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum time between two allowed actions (in milliseconds)
    pub interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000, // 1 second
        }
    }
}

impl ThrottleConfig {
    /// The interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        self.interval_ms.millis()
    }

    /// Build a throttler with this interval.
    pub fn build(&self) -> Throttler {
        Throttler::new(self.interval())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, used when `RUST_LOG` is not set
    pub level: LogLevel,

    /// Enable structured JSON logging
    pub json_format: bool,

    /// Enable colored output (ignored if json_format is true)
    pub colored: bool,

    /// Include target module in logs
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            colored: true,
            include_targets: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Helper trait for converting durations in configuration.
pub trait DurationExt {
    /// Convert seconds to Duration
    fn secs(self) -> Duration;
    /// Convert milliseconds to Duration
    fn millis(self) -> Duration;
}

impl DurationExt for u64 {
    fn secs(self) -> Duration {
        Duration::from_secs(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }
}

impl WorkConfig {
    /// Create a new configuration suited to local development.
    pub fn development() -> Self {
        Self {
            queue: QueueOptions::new(2, 0),
            throttle: ThrottleConfig { interval_ms: 1000 },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: true,
                include_targets: true,
                ..Default::default()
            },
        }
    }

    /// Create a new configuration suited to production.
    pub fn production() -> Self {
        Self {
            queue: QueueOptions::new(num_cpus::get() * 2, 0),
            throttle: ThrottleConfig { interval_ms: 5000 },
            logging: LoggingConfig {
                level: LogLevel::Info,
                json_format: true,
                colored: false,
                include_targets: false,
            },
        }
    }

    /// Create a configuration for testing.
    pub fn testing() -> Self {
        Self {
            queue: QueueOptions::new(1, 4),
            throttle: ThrottleConfig { interval_ms: 0 },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: false,
                include_targets: true,
                ..Default::default()
            },
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> WorkResult<Self> {
        serde_json::from_str(json).map_err(|e| WorkError::config(format!("invalid JSON: {e}")))
    }

    /// Build a configuration from the defaults overridden by environment
    /// variables:
    ///
    /// - `WORK_QUEUE_WORKERS`, `WORK_QUEUE_SIZE`
    /// - `WORK_THROTTLE_INTERVAL_MS`
    /// - `WORK_DEBUG` (switches the log level to debug)
    /// - `WORK_LOG_JSON`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.queue.workers = env::int("WORK_QUEUE_WORKERS", config.queue.workers);
        config.queue.size = env::int("WORK_QUEUE_SIZE", config.queue.size);
        config.throttle.interval_ms =
            env::int("WORK_THROTTLE_INTERVAL_MS", config.throttle.interval_ms);
        if env::flag("WORK_DEBUG", false) {
            config.logging.level = LogLevel::Debug;
        }
        config.logging.json_format = env::flag("WORK_LOG_JSON", config.logging.json_format);

        config
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.queue.workers > MAX_WORKERS {
            errors.push(format!("Number of workers should not exceed {MAX_WORKERS}"));
        } else if self.queue.resolved().size > MAX_QUEUE_SIZE {
            errors.push(format!("Queue size should not exceed {MAX_QUEUE_SIZE}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
