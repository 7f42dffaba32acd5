//! Queue whose worker cannot fail.

use super::{JobBuffer, QueueOptions, join_workers};
use crate::error::{WorkError, WorkResult};
use crate::signal::Signal;
use crate::task::{FnWorker, Job, Worker};
use std::future::Future;
use std::sync::Arc;

/// A bounded job buffer drained by a fixed pool of workers until the run
/// signal is cancelled.
pub struct Queue<T: Job> {
    buffer: JobBuffer<T>,
    worker: Option<Arc<dyn Worker<T>>>,
}

impl<T: Job> Queue<T> {
    /// Create a queue processing jobs with an async closure.
    pub fn new<F, Fut>(worker: F, options: QueueOptions) -> Self
    where
        F: Fn(Signal, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with_worker(FnWorker(worker), options)
    }

    /// Create a queue processing jobs with a [`Worker`] implementation.
    pub fn with_worker<W: Worker<T> + 'static>(worker: W, options: QueueOptions) -> Self {
        Self {
            buffer: JobBuffer::new(options),
            worker: Some(Arc::new(worker)),
        }
    }

    /// Create a queue that accepts jobs but refuses to run.
    pub fn without_worker(options: QueueOptions) -> Self {
        Self {
            buffer: JobBuffer::new(options),
            worker: None,
        }
    }

    /// Add a job to the buffer without waiting.
    ///
    /// Returns false if the buffer is full or the queue is closed.
    pub fn push(&self, job: T) -> bool {
        self.buffer.push(job)
    }

    /// Close the queue. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        self.buffer.close()
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    /// Number of workers started by [`Queue::run`].
    pub fn workers(&self) -> usize {
        self.buffer.workers()
    }

    /// Capacity of the job buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Number of jobs waiting to be picked up.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Process jobs until `signal` is cancelled.
    ///
    /// Once cancelled, waits for in-flight jobs to finish and closes the
    /// queue. A plain cancellation yields `Ok(())`; an expired deadline is
    /// returned as [`WorkError::DeadlineExceeded`].
    ///
    /// # Errors
    ///
    /// - [`WorkError::QueueClosed`] if the queue was already closed.
    /// - [`WorkError::WorkerMissing`] if no worker was supplied.
    pub async fn run(&self, signal: &Signal) -> WorkResult<()> {
        self.buffer.ensure_open()?;
        let worker = self.worker.clone().ok_or(WorkError::WorkerMissing)?;

        tracing::debug!("Starting queue with {} workers", self.buffer.workers());

        let handles = (0..self.buffer.workers())
            .map(|worker_id| {
                let intake = self.buffer.intake();
                let worker = Arc::clone(&worker);
                let signal = signal.clone();

                tokio::spawn(async move {
                    tracing::trace!("Worker {} started", worker_id);
                    while let Some((job, _permit)) = intake.next(&signal).await {
                        worker.process(signal.clone(), job).await;
                    }
                    tracing::trace!("Worker {} stopped", worker_id);
                })
            })
            .collect();

        signal.cancelled().await;
        join_workers(handles).await;
        self.close();
        self.buffer.retire();

        tracing::debug!("Queue stopped");
        signal.exit_status()
    }
}
