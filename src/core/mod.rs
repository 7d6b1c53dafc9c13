//! Core scheduling abstractions: tasks, suspension, descriptors, the loop.

pub mod error;
pub mod event_loop;
pub mod schedule;
pub mod task;
pub mod wait;

pub use error::{AppResult, SchedulerError};
pub use event_loop::{EventLoop, FaultPolicy, RunOptions, StepContext, TickOptions};
pub use schedule::{Countdown, CountdownState, Interval, Schedule, ScheduleId, Timeout};
pub use task::{routine_fn, Completion, Routine, StepOutcome, Task, TaskId};
pub use wait::{PeriodicDelay, SyncDelay};
