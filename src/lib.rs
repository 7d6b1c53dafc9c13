//! # Tickloop
//!
//! A deterministic, single-threaded cooperative tick scheduler for
//! resource-constrained control loops.
//!
//! This library runs many logical activities "concurrently" on one execution
//! context by interleaving short steps of each — no threads, no preemption,
//! no async runtime underneath. Each pass of the loop (a *tick*) advances
//! every live task by exactly one step; a task cedes control by returning
//! a pending outcome from its routine and resumes exactly where it left off
//! on the next tick.
//!
//! ## Core Problem Solved
//!
//! Control loops on constrained targets have different needs than servers:
//!
//! - **Determinism**: scheduling decisions must be reproducible; ordering is
//!   a total order over (priority, admission time, id), never a race
//! - **Bounded tick work**: a per-tick step limit caps latency for the
//!   activities that matter
//! - **Cheap cancellation**: tag groups remove whole families of tasks at a
//!   tick boundary, no signals involved
//! - **Policy-driven recurrence**: timeout, interval (with back-pressure),
//!   and pausable countdown descriptors decide *when* work becomes ready,
//!   independent of any running task
//!
//! ## Tick loop
//!
//! ```rust,ignore
//! use tickloop::core::{EventLoop, RunOptions, StepOutcome, Task};
//!
//! let mut el = EventLoop::new();
//! el.add(Task::from_fn(|_cx| {
//!     // do one slice of work...
//!     Ok(StepOutcome::Complete)
//! }));
//! el.run(&RunOptions { stop_when_idle: true, ..RunOptions::default() })?;
//! ```
//!
//! ## Schedules
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tickloop::core::{routine_fn, EventLoop, Interval, StepOutcome};
//!
//! let mut el = EventLoop::new();
//! el.register(
//!     Interval::new(Duration::from_secs(2), || {
//!         routine_fn(|_cx| Ok(StepOutcome::Complete))
//!     })
//!     .immediate()
//!     .blocking(),
//! );
//! ```
//!
//! For complete scenarios, see `tests/tick_loop_test.rs` and
//! `tests/schedule_test.rs`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, suspension, descriptors, the loop.
pub mod core;
/// Configuration models for the loop and its policies.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Collaborator adapters for tilt classification and debounced input.
pub mod infra;
/// Shared utilities.
pub mod util;
