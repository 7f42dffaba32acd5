//! Coordination primitives that sit above the queues.
//!
//! - [`Runner`]: fan-in over independent fallible tasks with first-error
//!   capture and cooperative cancellation.
//! - [`Throttler`]: gates how often an action may run.

pub mod runner;
pub mod throttler;

pub use runner::Runner;
pub use throttler::Throttler;
