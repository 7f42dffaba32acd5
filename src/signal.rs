//! Cooperative cancellation with an attachable cause.
//!
//! A [`Signal`] is a cheap, cloneable handle around a
//! [`CancellationToken`]. Besides the broadcast "stop" notification it
//! remembers *why* it was cancelled: a plain cancellation, an expired
//! deadline, or an arbitrary [`WorkError`] attached by whoever cancelled it
//! first.
//!
//! Signals form a tree. A child is cancelled together with its parent, but
//! cancelling a child never reaches the parent.
//!
//! # Examples
//!
//! ```rust
//! use workbench::{Signal, WorkError};
//!
//! let root = Signal::new();
//! let child = root.child();
//!
//! root.cancel_with(WorkError::failed("upstream failed"));
//! assert!(child.is_cancelled());
//! assert_eq!(child.cause().unwrap().to_string(), "upstream failed");
//! assert!(child.err().unwrap().is_cancellation());
//! ```

use crate::error::{WorkError, WorkResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a signal was cancelled.
#[derive(Debug, Clone)]
enum Reason {
    /// Cancelled explicitly, with an optional cause
    Cancelled(Option<WorkError>),
    /// The deadline passed
    Expired,
}

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    reason: Mutex<Option<Reason>>,
    parent: Option<Signal>,
}

/// A shared cancellation signal carrying an optional cause.
#[derive(Debug, Clone)]
pub struct Signal {
    inner: Arc<Inner>,
}

impl Signal {
    /// Create a root signal that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::from_parts(CancellationToken::new(), None)
    }

    fn from_parts(token: CancellationToken, parent: Option<Signal>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                reason: Mutex::new(None),
                parent,
            }),
        }
    }

    /// Derive a signal that is cancelled when this one is, and that can be
    /// cancelled on its own without affecting this one.
    pub fn child(&self) -> Self {
        Self::from_parts(self.inner.token.child_token(), Some(self.clone()))
    }

    /// Derive a signal that cancels itself with
    /// [`WorkError::DeadlineExceeded`] once `timeout` has elapsed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        let timer = child.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if timer.settle(Reason::Expired) {
                        tracing::debug!("Signal deadline of {:?} exceeded", timeout);
                    }
                }
                _ = timer.cancelled() => {}
            }
        });

        child
    }

    /// Derive a signal that is cancelled when the process receives Ctrl+C.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_interrupt(&self) -> Self {
        let child = self.child();
        let watcher = child.clone();

        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        tracing::info!("Received Ctrl+C, cancelling signal");
                        watcher.cancel();
                    }
                    Err(e) => {
                        tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    }
                },
                _ = watcher.cancelled() => {}
            }
        });

        child
    }

    /// Cancel the signal. No-op if it is already cancelled.
    pub fn cancel(&self) {
        self.settle(Reason::Cancelled(None));
    }

    /// Cancel the signal and attach `cause`. No-op if it is already
    /// cancelled; the first cause wins.
    pub fn cancel_with(&self, cause: WorkError) {
        self.settle(Reason::Cancelled(Some(cause)));
    }

    /// Record `reason` and fire the token. Returns false if the signal was
    /// already cancelled, by itself or through an ancestor.
    fn settle(&self, reason: Reason) -> bool {
        {
            let mut slot = self.inner.reason.lock();
            if slot.is_some() || self.inner.token.is_cancelled() {
                return false;
            }
            *slot = Some(reason);
        }
        self.inner.token.cancel();
        true
    }

    /// Whether the signal has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the signal is cancelled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// `None` while the signal is live. Afterwards either
    /// [`WorkError::Cancelled`] or [`WorkError::DeadlineExceeded`],
    /// regardless of any attached cause.
    pub fn err(&self) -> Option<WorkError> {
        if !self.is_cancelled() {
            return None;
        }
        match self.reason() {
            Some(Reason::Expired) => Some(WorkError::DeadlineExceeded),
            Some(Reason::Cancelled(_)) => Some(WorkError::Cancelled),
            None => self
                .inner
                .parent
                .as_ref()
                .and_then(Signal::err)
                .or(Some(WorkError::Cancelled)),
        }
    }

    /// The cause attached by whoever cancelled the signal first, falling
    /// back to [`Signal::err`] when none was attached.
    pub fn cause(&self) -> Option<WorkError> {
        if !self.is_cancelled() {
            return None;
        }
        match self.reason() {
            Some(Reason::Cancelled(Some(cause))) => Some(cause),
            Some(Reason::Cancelled(None)) => Some(WorkError::Cancelled),
            Some(Reason::Expired) => Some(WorkError::DeadlineExceeded),
            None => self
                .inner
                .parent
                .as_ref()
                .and_then(Signal::cause)
                .or(Some(WorkError::Cancelled)),
        }
    }

    /// Outcome of a run loop that stopped because of this signal: a plain
    /// cancellation is an orderly shutdown, anything else is reported.
    pub(crate) fn exit_status(&self) -> WorkResult<()> {
        match self.err() {
            Some(err) if !err.is_cancellation() => Err(err),
            _ => Ok(()),
        }
    }

    /// The underlying token, for interop with code built on
    /// `tokio_util` directly.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    fn reason(&self) -> Option<Reason> {
        self.inner.reason.lock().clone()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl From<CancellationToken> for Signal {
    fn from(token: CancellationToken) -> Self {
        Self::from_parts(token, None)
    }
}
