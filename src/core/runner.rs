//! Fan-in runner for independent fallible tasks.
//!
//! A [`Runner`] launches tasks that share one derived [`Signal`]. The first
//! task to fail, in completion order, has its error captured and attached to
//! the signal as the cancellation cause, so that every other task can notice
//! and unwind. Later failures are discarded.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workbench::prelude::*;
//!
//! # async fn example(queue: Arc<ErrQueue<u32>>) -> WorkResult<()> {
//! let (runner, signal) = Runner::new(&Signal::new().on_interrupt());
//!
//! {
//!     let queue = Arc::clone(&queue);
//!     let signal = signal.clone();
//!     runner.run(async move { queue.run(&signal).await });
//! }
//! {
//!     let signal = signal.clone();
//!     runner.run(async move {
//!         signal.cancelled().await;
//!         queue.close();
//!         Ok(())
//!     });
//! }
//!
//! runner.wait().await
//! # }
//! ```

use crate::error::{WorkError, WorkResult};
use crate::signal::Signal;
use parking_lot::Mutex;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::task::{JoinError, JoinHandle};

/// Runs tasks concurrently and keeps the first error.
pub struct Runner {
    signal: Signal,
    first_error: Arc<OnceLock<WorkError>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Runner {
    /// Create a runner bound to a child of `parent`.
    ///
    /// The returned signal is cancelled when a task fails, when `parent` is
    /// cancelled, or once [`Runner::wait`] returns.
    pub fn new(parent: &Signal) -> (Self, Signal) {
        let signal = parent.child();
        let runner = Self {
            signal: signal.clone(),
            first_error: Arc::new(OnceLock::new()),
            handles: Mutex::new(Vec::new()),
        };
        (runner, signal)
    }

    /// Launch `task` on the Tokio runtime.
    pub fn run<F>(&self, task: F)
    where
        F: Future<Output = WorkResult<()>> + Send + 'static,
    {
        let signal = self.signal.clone();
        let first_error = Arc::clone(&self.first_error);

        let handle = tokio::spawn(async move {
            let Err(err) = task.await else {
                return;
            };

            if first_error.set(err.clone()).is_ok() {
                tracing::debug!("Runner task failed, cancelling: {}", err);
                signal.cancel_with(err);
            } else {
                tracing::debug!("Runner task failed after the first error, discarding: {}", err);
            }
        });

        let mut handles = self.handles.lock();
        prune_finished(&mut handles);
        handles.push(handle);
    }

    /// Number of launched tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait for every launched task, cancel the runner's signal, and return
    /// the first error if any task failed.
    pub async fn wait(self) -> WorkResult<()> {
        let handles = std::mem::take(&mut *self.handles.lock());

        for result in futures::future::join_all(handles).await {
            report_panic(result);
        }

        match self.first_error.get().cloned() {
            Some(err) => {
                self.signal.cancel_with(err.clone());
                Err(err)
            }
            None => {
                self.signal.cancel();
                Ok(())
            }
        }
    }
}

/// Drop the handles of tasks that already finished.
fn prune_finished(handles: &mut Vec<JoinHandle<()>>) {
    handles.retain_mut(|handle| {
        if !handle.is_finished() {
            return true;
        }
        match FutureExt::now_or_never(&mut *handle) {
            Some(result) => {
                report_panic(result);
                false
            }
            None => true,
        }
    });
}

fn report_panic(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!("Runner task panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::{sleep, timeout};
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_runner_success() {
        let (runner, signal) = Runner::new(&Signal::new());

        let (done_tx, done_rx) = oneshot::channel();
        runner.run(async move {
            let _ = done_tx.send(());
            Ok(())
        });

        timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("task did not finish")
            .unwrap();
        assert!(!signal.is_cancelled(), "signal cancelled before wait");

        assert_ok!(runner.wait().await);
        assert!(signal.is_cancelled());
        assert!(signal.cause().unwrap().is_cancellation());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runner_first_error_wins() {
        let (runner, signal) = Runner::new(&Signal::new());

        runner.run(async { Err(WorkError::failed("first error")) });
        runner.run(async {
            sleep(Duration::from_millis(10)).await;
            Err(WorkError::failed("second error"))
        });

        timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("signal was not cancelled after first error");

        let err = runner.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "first error");
        assert_eq!(signal.cause().unwrap().to_string(), "first error");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_completion_order_beats_registration_order() {
        let (runner, signal) = Runner::new(&Signal::new());

        runner.run(async {
            sleep(Duration::from_millis(30)).await;
            Err(WorkError::failed("registered first"))
        });
        runner.run(async { Err(WorkError::failed("finished first")) });

        let err = runner.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "finished first");
        assert_eq!(signal.cause().unwrap().to_string(), "finished first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_unwinds_waiting_tasks() {
        let (runner, signal) = Runner::new(&Signal::new());

        {
            let signal = signal.clone();
            runner.run(async move {
                // runs until someone else fails
                signal.cancelled().await;
                Ok(())
            });
        }
        runner.run(async { Err(WorkError::failed("boom")) });

        let result = timeout(Duration::from_secs(1), runner.wait())
            .await
            .expect("waiting task never unwound");
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_tasks() {
        let parent = Signal::new();
        let (runner, signal) = Runner::new(&parent);

        {
            let signal = signal.clone();
            runner.run(async move {
                signal.cancelled().await;
                Ok(())
            });
        }
        assert_eq!(runner.active_tasks(), 1);

        parent.cancel();
        assert_ok!(runner.wait().await);
        assert!(signal.cause().unwrap().is_cancellation());
    }

    #[tokio::test]
    async fn test_finished_tasks_are_pruned() {
        let (runner, _signal) = Runner::new(&Signal::new());
        for _ in 0..16 {
            runner.run(async { Ok(()) });
        }

        timeout(Duration::from_secs(2), async {
            while runner.active_tasks() > 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        runner.run(async { Ok(()) });
        assert!(runner.handles.lock().len() <= 1);
        assert_ok!(runner.wait().await);
    }

    #[tokio::test]
    async fn test_wait_without_tasks() {
        let (runner, signal) = Runner::new(&Signal::new());
        assert_eq!(runner.active_tasks(), 0);
        assert_ok!(runner.wait().await);
        assert!(signal.is_cancelled());
    }
}
