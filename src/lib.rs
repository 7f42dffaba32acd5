//! # workbench
//!
//! Bounded concurrent task execution for tokio applications.
//!
//! ## Features
//!
//! - **Bounded queues**: a fixed pool of workers drains a fixed-size buffer;
//!   pushing never blocks the producer
//! - **First-error propagation**: [`ErrQueue`] stops every worker on the
//!   first failing job and returns that failure
//! - **Fan-in runner**: [`Runner`] launches independent tasks, keeps the
//!   first error and cancels the rest through a shared [`Signal`]
//! - **Cancellation with cause**: [`Signal`] remembers why it was cancelled
//! - **Throttling**: [`Throttler`] allows an action at most once per interval
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workbench::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> WorkResult<()> {
//!     let queue = Arc::new(ErrQueue::new(
//!         |_signal: Signal, n: u64| async move {
//!             if n == 13 {
//!                 return Err(WorkError::failed("unlucky job"));
//!             }
//!             Ok(())
//!         },
//!         QueueOptions::default(),
//!     ));
//!
//!     let (runner, signal) = Runner::new(&Signal::new().on_interrupt());
//!     {
//!         let queue = Arc::clone(&queue);
//!         let signal = signal.clone();
//!         runner.run(async move { queue.run(&signal).await });
//!     }
//!
//!     for n in 0..10 {
//!         queue.push(n);
//!     }
//!
//!     runner.wait().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod env;
pub mod error;
pub mod logging;
pub mod queue;
pub mod signal;
pub mod task;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::core::{Runner, Throttler};
    pub use crate::error::{WorkError, WorkResult};
    pub use crate::queue::{ErrQueue, Queue, QueueOptions};
    pub use crate::signal::Signal;
    pub use crate::task::{FallibleWorker, Job, Worker};
    pub use async_trait::async_trait;
}

pub use crate::config::*;
pub use crate::core::{Runner, Throttler};
pub use crate::error::{WorkError, WorkResult};
pub use crate::queue::{ErrQueue, Queue, QueueOptions};
pub use crate::signal::Signal;
pub use crate::task::{FallibleWorker, Job, Worker};
pub use async_trait::async_trait;
