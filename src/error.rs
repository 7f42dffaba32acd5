//! Error types for workbench operations.

use std::sync::Arc;
use thiserror::Error;

/// Result type used throughout workbench.
pub type WorkResult<T> = Result<T, WorkError>;

/// Main error type for workbench operations.
///
/// The type is `Clone` so that one failure can be handed back to a caller
/// and attached to a [`Signal`](crate::Signal) as its cancellation cause at
/// the same time.
#[derive(Error, Debug, Clone)]
pub enum WorkError {
    /// The queue was already closed
    #[error("queue is closed")]
    QueueClosed,

    /// The queue was built without a worker
    #[error("worker must be provided")]
    WorkerMissing,

    /// The signal was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The signal expired
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A job or task failed
    #[error("{message}")]
    Failed {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

impl WorkError {
    /// Create a job failure with a plain message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a job failure wrapping an underlying error
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this is the plain cancellation condition, which callers treat
    /// as an orderly shutdown rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
