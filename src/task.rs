//! Job and worker definitions.
//!
//! A job is any owned, sendable value. A worker is the single plug-in point of
//! a queue: either an async closure taking the queue's [`Signal`] and one job,
//! or a type implementing [`Worker`] / [`FallibleWorker`].

use crate::error::WorkResult;
use crate::signal::Signal;
use async_trait::async_trait;
use std::future::Future;

/// A unit of work submitted to a queue.
///
/// Jobs carry no identity and are never persisted; the queue only moves
/// them from producers to workers.
pub trait Job: Send + 'static {}

impl<T: Send + 'static> Job for T {}

/// Processes jobs and cannot fail.
///
/// # Examples
///
/// ```rust
/// use workbench::prelude::*;
///
/// struct Printer;
///
/// #[async_trait]
/// impl Worker<String> for Printer {
///     async fn process(&self, _signal: Signal, job: String) {
///         println!("{job}");
///     }
/// }
///
/// let queue = Queue::with_worker(Printer, QueueOptions::default());
/// assert!(queue.push("hello".to_string()));
/// ```
#[async_trait]
pub trait Worker<T: Job>: Send + Sync {
    /// Process one job. Long-running work should watch `signal`.
    async fn process(&self, signal: Signal, job: T);
}

/// Processes jobs and may fail; the first failure stops an
/// [`ErrQueue`](crate::ErrQueue).
#[async_trait]
pub trait FallibleWorker<T: Job>: Send + Sync {
    /// Process one job. Long-running work should watch `signal`.
    async fn process(&self, signal: Signal, job: T) -> WorkResult<()>;
}

/// Adapts an async closure to the worker traits.
pub(crate) struct FnWorker<F>(pub(crate) F);

#[async_trait]
impl<T, F, Fut> Worker<T> for FnWorker<F>
where
    T: Job,
    F: Fn(Signal, T) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn process(&self, signal: Signal, job: T) {
        (self.0)(signal, job).await
    }
}

#[async_trait]
impl<T, F, Fut> FallibleWorker<T> for FnWorker<F>
where
    T: Job,
    F: Fn(Signal, T) -> Fut + Send + Sync,
    Fut: Future<Output = WorkResult<()>> + Send + 'static,
{
    async fn process(&self, signal: Signal, job: T) -> WorkResult<()> {
        (self.0)(signal, job).await
    }
}
