//! Queue whose worker may fail.
//!
//! The first failing job stops the whole pool: its error is posted to a
//! dedicated channel, the queue cancels its own child signal so the other
//! workers unwind, and [`ErrQueue::run`] returns that error.

use super::{JobBuffer, QueueOptions, join_workers};
use crate::error::{WorkError, WorkResult};
use crate::signal::Signal;
use crate::task::{FallibleWorker, FnWorker, Job};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

/// A bounded job buffer drained by a fixed pool of fallible workers.
pub struct ErrQueue<T: Job> {
    buffer: JobBuffer<T>,
    errors_tx: Mutex<Option<mpsc::Sender<WorkError>>>,
    errors_rx: AsyncMutex<mpsc::Receiver<WorkError>>,
    worker: Option<Arc<dyn FallibleWorker<T>>>,
}

impl<T: Job> ErrQueue<T> {
    /// Create a queue processing jobs with a fallible async closure.
    pub fn new<F, Fut>(worker: F, options: QueueOptions) -> Self
    where
        F: Fn(Signal, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult<()>> + Send + 'static,
    {
        Self::with_worker(FnWorker(worker), options)
    }

    /// Create a queue processing jobs with a [`FallibleWorker`].
    pub fn with_worker<W: FallibleWorker<T> + 'static>(worker: W, options: QueueOptions) -> Self {
        Self::build(Some(Arc::new(worker)), options)
    }

    /// Create a queue that accepts jobs but refuses to run.
    pub fn without_worker(options: QueueOptions) -> Self {
        Self::build(None, options)
    }

    fn build(worker: Option<Arc<dyn FallibleWorker<T>>>, options: QueueOptions) -> Self {
        let buffer = JobBuffer::new(options);
        let (errors_tx, errors_rx) = mpsc::channel(buffer.capacity());

        Self {
            buffer,
            errors_tx: Mutex::new(Some(errors_tx)),
            errors_rx: AsyncMutex::new(errors_rx),
            worker,
        }
    }

    /// Add a job to the buffer without waiting.
    ///
    /// Returns false if the buffer is full or the queue is closed.
    pub fn push(&self, job: T) -> bool {
        self.buffer.push(job)
    }

    /// Close the queue and its error channel. Returns true only for the call
    /// that closed it.
    pub fn close(&self) -> bool {
        if !self.buffer.close() {
            return false;
        }
        self.errors_tx.lock().take();
        true
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    /// Number of workers started by [`ErrQueue::run`].
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

    /// Process jobs until `signal` is cancelled or a job fails.
    ///
    /// # Errors
    ///
    /// - [`WorkError::QueueClosed`] if the queue was already closed.
    /// - [`WorkError::WorkerMissing`] if no worker was supplied.
    /// - The first job failure, after every worker has stopped.
    /// - [`WorkError::DeadlineExceeded`] if `signal` expired.
    pub async fn run(&self, signal: &Signal) -> WorkResult<()> {
        self.buffer.ensure_open()?;
        let worker = self.worker.clone().ok_or(WorkError::WorkerMissing)?;
        let errors = self.errors_tx.lock().clone().ok_or(WorkError::QueueClosed)?;

        let halt = signal.child();
        tracing::debug!("Starting error queue with {} workers", self.buffer.workers());

        let handles = (0..self.buffer.workers())
            .map(|worker_id| {
                let intake = self.buffer.intake();
                let worker = Arc::clone(&worker);
                let errors = errors.clone();
                let halt = halt.clone();

                tokio::spawn(async move {
                    tracing::trace!("Worker {} started", worker_id);
                    while let Some((job, _permit)) = intake.next(&halt).await {
                        if let Err(err) = worker.process(halt.clone(), job).await {
                            tracing::debug!("Worker {} stopping after failure: {}", worker_id, err);
                            if errors.try_send(err).is_err() {
                                tracing::trace!("Error channel full, dropping failure");
                            }
                            break;
                        }
                    }
                    tracing::trace!("Worker {} stopped", worker_id);
                })
            })
            .collect();
        drop(errors);

        let failure = tokio::select! {
            biased;
            Some(err) = async { self.errors_rx.lock().await.recv().await } => Some(err),
            _ = halt.cancelled() => None,
        };

        if let Some(err) = &failure {
            halt.cancel_with(err.clone());
        }
        join_workers(handles).await;
        self.close();
        self.buffer.retire();

        tracing::debug!("Error queue stopped");
        match failure {
            Some(err) => Err(err),
            None => signal.exit_status(),
        }
    }
}
