//! Bounded job queues drained by a fixed pool of workers.
//!
//! Two flavours share the same buffer core:
//! - [`Queue`]: the worker cannot fail; the queue runs until its signal is
//!   cancelled.
//! - [`ErrQueue`]: the worker may fail; the first failure stops every worker
//!   and is returned from [`ErrQueue::run`].
//!
//! Both are meant to be shared behind an [`Arc`] so that producers can
//! [`push`](Queue::push) while another task drives `run`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workbench::prelude::*;
//!
//! # async fn example() -> WorkResult<()> {
//! let queue = Arc::new(Queue::new(
//!     |_signal: Signal, line: String| async move { println!("{line}") },
//!     QueueOptions::default().with_workers(2),
//! ));
//!
//! let signal = Signal::new();
//! let runner = {
//!     let queue = Arc::clone(&queue);
//!     let signal = signal.clone();
//!     tokio::spawn(async move { queue.run(&signal).await })
//! };
//!
//! queue.push("hello".to_string());
//! signal.cancel();
//! runner.await.expect("queue task panicked")?;
//! # Ok(())
//! # }
//! ```

use crate::error::{WorkError, WorkResult};
use crate::signal::Signal;
use crate::task::Job;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;

pub mod bounded;
pub mod fallible;

pub use bounded::Queue;
pub use fallible::ErrQueue;

/// Sizing of a queue.
///
/// A zero field means "derive the default": `workers` falls back to the
/// number of logical CPUs and `size` to four slots per worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Number of concurrent workers
    pub workers: usize,

    /// Capacity of the job buffer
    pub size: usize,
}

impl QueueOptions {
    /// Create options with explicit workers and buffer size.
    pub fn new(workers: usize, size: usize) -> Self {
        Self { workers, size }
    }

    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the buffer size.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Replace zero fields with their derived defaults.
    pub fn resolved(self) -> Self {
        let workers = match self.workers {
            0 => num_cpus::get().max(1),
            n => n,
        };
        let size = match self.size {
            0 => workers.saturating_mul(4),
            n => n,
        };
        Self { workers, size }
    }
}

/// State shared by both queue flavours: the bounded buffer, the permit set
/// and the one-way `closed` flag.
pub(crate) struct JobBuffer<T> {
    closed: AtomicBool,
    workers: usize,
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<T>>>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<T>>>,
    permits: Arc<Semaphore>,
}

impl<T: Job> JobBuffer<T> {
    pub(crate) fn new(options: QueueOptions) -> Self {
        let QueueOptions { workers, size } = options.resolved();
        let workers = workers.min(Semaphore::MAX_PERMITS);
        let size = size.min(Semaphore::MAX_PERMITS);
        let (sender, receiver) = mpsc::channel(size);

        Self {
            closed: AtomicBool::new(false),
            workers,
            capacity: size,
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(AsyncMutex::new(receiver)),
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Offer a job without waiting. False if the buffer is full or closed.
    pub(crate) fn push(&self, job: T) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(job).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs. Jobs already buffered stay available to the
    /// intake until drained. Only the first caller gets `true`.
    pub(crate) fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.sender.lock().take();
        tracing::trace!("Job buffer closed");
        true
    }

    /// Close the permit set once every worker loop has been joined.
    pub(crate) fn retire(&self) {
        self.close();
        self.permits.close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> WorkResult<()> {
        if self.is_closed() {
            return Err(WorkError::QueueClosed);
        }
        Ok(())
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs waiting in the buffer. Zero once closed.
    pub(crate) fn len(&self) -> usize {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.max_capacity() - sender.capacity(),
            None => 0,
        }
    }

    pub(crate) fn intake(&self) -> Intake<T> {
        Intake {
            receiver: Arc::clone(&self.receiver),
            permits: Arc::clone(&self.permits),
        }
    }
}

/// The consuming side of a [`JobBuffer`], cloned into every worker loop.
pub(crate) struct Intake<T> {
    receiver: Arc<AsyncMutex<mpsc::Receiver<T>>>,
    permits: Arc<Semaphore>,
}

impl<T: Job> Intake<T> {
    /// Wait for the next job or for cancellation, whichever comes first.
    ///
    /// Returns the job together with the permit that must be held while it
    /// is processed; dropping the permit releases it, also on unwind. `None`
    /// means the worker loop should exit.
    pub(crate) async fn next(&self, signal: &Signal) -> Option<(T, OwnedSemaphorePermit)> {
        let job = tokio::select! {
            biased;
            _ = signal.cancelled() => return None,
            job = async { self.receiver.lock().await.recv().await } => job?,
        };

        match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => Some((job, permit)),
            Err(_) => {
                tracing::trace!("Permit set closed, dropping job");
                None
            }
        }
    }
}

/// Wait for every worker loop, reporting the ones that panicked.
pub(crate) async fn join_workers(handles: Vec<JoinHandle<()>>) {
    for (worker_id, result) in join_all(handles).await.into_iter().enumerate() {
        match result {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                tracing::error!("Worker {} panicked: {}", worker_id, e);
            }
            Err(e) => {
                tracing::warn!("Worker {} did not finish: {}", worker_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_default_options_are_derived() {
        let options = QueueOptions::default().resolved();
        assert_eq!(options.workers, num_cpus::get().max(1));
        assert_eq!(options.size, options.workers * 4);

        let options = QueueOptions::default().with_workers(3).resolved();
        assert_eq!(options, QueueOptions::new(3, 12));

        let options = QueueOptions::new(2, 5).resolved();
        assert_eq!(options, QueueOptions::new(2, 5));
    }

    #[test]
    fn test_options_from_json() {
        let options: QueueOptions = serde_json::from_str(r#"{"workers": 6}"#).unwrap();
        assert_eq!(options, QueueOptions::new(6, 0));
    }

    #[test]
    fn test_push_until_full() {
        for (workers, size) in [(1, 1), (1, 2), (3, 5), (4, 16)] {
            let buffer = JobBuffer::<u32>::new(QueueOptions::new(workers, size));
            for job in 0..size {
                assert!(buffer.push(job as u32), "push {job} of {size} rejected");
            }
            assert_eq!(buffer.len(), size);
            assert!(!buffer.push(99));
        }
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let buffer = JobBuffer::<u32>::new(QueueOptions::new(1, 4));
        assert!(buffer.push(1));

        assert!(buffer.close());
        assert!(!buffer.close());
        assert!(buffer.is_closed());
        assert!(!buffer.push(2));
        assert_eq!(buffer.len(), 0);
        assert!(matches!(buffer.ensure_open(), Err(WorkError::QueueClosed)));
    }

    #[test]
    fn test_concurrent_close_tears_down_once() {
        const THREADS: usize = 8;

        let buffer = Arc::new(JobBuffer::<u32>::new(QueueOptions::new(2, 4)));
        let barrier = Arc::new(Barrier::new(THREADS));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    barrier.wait();
                    if buffer.close() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(buffer.sender.lock().is_none());
        assert!(!buffer.permits.is_closed());
    }

    #[tokio::test]
    async fn test_intake_drains_after_close() {
        let buffer = JobBuffer::<u32>::new(QueueOptions::new(1, 4));
        buffer.push(1);
        buffer.push(2);
        assert!(buffer.close());

        let intake = buffer.intake();
        let signal = Signal::new();
        let (first, permit) = intake.next(&signal).await.unwrap();
        drop(permit);
        let (second, _permit) = intake.next(&signal).await.unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn test_intake_stops_when_drained_and_closed() {
        let buffer = JobBuffer::<u32>::new(QueueOptions::new(1, 4));
        buffer.retire();

        assert!(buffer.intake().next(&Signal::new()).await.is_none());
        assert!(buffer.permits.is_closed());
    }

    #[test]
    fn test_huge_worker_count_saturates() {
        let options = QueueOptions::new(usize::MAX / 2, 0).resolved();
        assert_eq!(options.workers, usize::MAX / 2);
        assert_eq!(options.size, usize::MAX);

        let buffer = JobBuffer::<u32>::new(QueueOptions::new(1, usize::MAX));
        assert_eq!(buffer.capacity(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn test_intake_prefers_cancellation() {
        let buffer = JobBuffer::<u32>::new(QueueOptions::new(1, 4));
        assert!(buffer.push(7));

        let signal = Signal::new();
        signal.cancel();

        assert!(buffer.intake().next(&signal).await.is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn test_intake_hands_out_permits() {
        let buffer = JobBuffer::<u32>::new(QueueOptions::new(2, 4));
        buffer.push(1);
        buffer.push(2);

        let intake = buffer.intake();
        let signal = Signal::new();
        let (first, permit) = intake.next(&signal).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(buffer.permits.available_permits(), 1);

        drop(permit);
        assert_eq!(buffer.permits.available_permits(), 2);
    }
}
