//! Task abstraction: one schedulable unit of work and its lifecycle.
//!
//! A [`Task`] owns a [`Routine`] (the unit of work, advanced one suspension
//! point at a time) plus the scheduling metadata the loop orders and polices
//! it by: priority, tags, delay, timeout, interval, and the `bind` flag that
//! grants the routine access to scheduler operations through its step
//! context.
//!
//! The loop never preempts a routine; between suspension points a step runs
//! to completion. Timeout and cancellation are therefore poll-based and take
//! effect on the next step boundary.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::core::error::{AppResult, SchedulerError};
use crate::core::event_loop::StepContext;

/// Unique task identifier, assigned from the process-wide generator.
pub type TaskId = u64;

/// Result of advancing a routine by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The routine reached a suspension point; call again next tick.
    Pending,
    /// The routine ran to its natural end.
    Complete,
}

/// How a completed task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The routine ran to its natural end.
    Normal,
    /// The step budget was exceeded and the task was force-terminated.
    TimedOut,
    /// The routine raised an unhandled error.
    Errored,
}

/// A resumable unit of work, advanced by single-step calls from the loop.
///
/// A routine that returns [`StepOutcome::Complete`] on its first step models
/// a plain (non-suspending) callable. Routines that suspend keep their own
/// phase state between steps; see [`crate::core::wait::SyncDelay`] for the
/// standard way to cede control until a deadline.
pub trait Routine: Send {
    /// Advances the routine by exactly one step.
    fn step(&mut self, cx: &mut StepContext<'_>) -> AppResult<StepOutcome>;

    /// Returns the routine to its initial phase before an interval re-run.
    ///
    /// The default is a no-op, which is correct for routines whose state is
    /// re-derived on each run.
    fn reset(&mut self) {}
}

impl<F> Routine for F
where
    F: FnMut(&mut StepContext<'_>) -> AppResult<StepOutcome> + Send,
{
    fn step(&mut self, cx: &mut StepContext<'_>) -> AppResult<StepOutcome> {
        self(cx)
    }
}

impl Routine for Box<dyn Routine> {
    fn step(&mut self, cx: &mut StepContext<'_>) -> AppResult<StepOutcome> {
        (**self).step(cx)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Boxes a step closure as a routine.
///
/// Handy inside schedule-descriptor factories, which produce a fresh routine
/// per firing.
pub fn routine_fn<F>(step: F) -> Box<dyn Routine>
where
    F: FnMut(&mut StepContext<'_>) -> AppResult<StepOutcome> + Send + 'static,
{
    Box::new(step)
}

/// Execution phase of a task.
#[derive(Debug, Clone, Copy)]
enum Phase {
    NotStarted,
    Running,
    AwaitingRestart { resume_at: Instant },
    Completed,
}

/// One schedulable unit: a routine plus priority, tags, and lifecycle state.
///
/// Constructed with [`Task::new`] or [`Task::from_fn`] and refined with
/// `with_*` builder calls, then handed to
/// [`EventLoop::add`](crate::core::event_loop::EventLoop::add). Once added,
/// the loop owns the task exclusively and drops it at the first tick boundary
/// where it is observed completed.
pub struct Task {
    id: TaskId,
    routine: Box<dyn Routine>,
    priority: i32,
    tags: BTreeSet<String>,
    delay: Option<Duration>,
    timeout: Option<Duration>,
    interval: Option<Duration>,
    bind: bool,
    created_at: Option<Instant>,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
    started: bool,
    completed: bool,
    timed_out: bool,
    errored: bool,
    phase: Phase,
}

impl Task {
    /// Creates a task from any routine.
    pub fn new(routine: impl Routine + 'static) -> Self {
        Self::from_boxed(Box::new(routine))
    }

    /// Creates a task from an already-boxed routine.
    pub fn from_boxed(routine: Box<dyn Routine>) -> Self {
        Self {
            id: crate::util::id::next_id(),
            routine,
            priority: 0,
            tags: BTreeSet::new(),
            delay: None,
            timeout: None,
            interval: None,
            bind: false,
            created_at: None,
            started_at: None,
            completed_at: None,
            started: false,
            completed: false,
            timed_out: false,
            errored: false,
            phase: Phase::NotStarted,
        }
    }

    /// Creates a task from a step closure.
    pub fn from_fn<F>(step: F) -> Self
    where
        F: FnMut(&mut StepContext<'_>) -> AppResult<StepOutcome> + Send + 'static,
    {
        Self::new(step)
    }

    /// Sets the priority. Higher runs earlier within a tick; default 0.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds one cancellation tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds a set of cancellation tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Waits `delay` after admission before the first step is attempted.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Force-terminates the task once `timeout` has elapsed since its first
    /// started step.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Re-runs the routine `interval` after each full completion,
    /// indefinitely. The routine's [`Routine::reset`] is called before each
    /// re-run.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Exposes scheduler operations to the routine through its step context.
    #[must_use]
    pub fn bound(mut self) -> Self {
        self.bind = true;
        self
    }

    /// Returns the task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the cancellation tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Whether the routine receives scheduler operations.
    pub fn is_bound(&self) -> bool {
        self.bind
    }

    /// Whether the first step has run.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the task has finished (normally, by timeout, or by error).
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the task was force-terminated by its timeout.
    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Whether the routine raised an unhandled error.
    pub fn is_errored(&self) -> bool {
        self.errored
    }

    /// Whether the task completed without errors or timeouts.
    pub fn completed_successfully(&self) -> bool {
        self.completed && !self.errored && !self.timed_out
    }

    /// Admission timestamp, set when the task enters a loop.
    pub fn created_at(&self) -> Option<Instant> {
        self.created_at
    }

    /// First-step timestamp.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Completion timestamp.
    pub fn completed_at(&self) -> Option<Instant> {
        self.completed_at
    }

    /// Time spent executing: zero before start, frozen at completion.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => completed.saturating_duration_since(started),
            (Some(started), None) => now.saturating_duration_since(started),
            (None, _) => Duration::ZERO,
        }
    }

    /// Stamps the admission time. Idempotent.
    pub(crate) fn admit(&mut self, now: Instant) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
    }

    /// Advances the task by one step.
    ///
    /// Completed tasks are a no-op; a delayed task that has not reached its
    /// delay is a no-op. A routine error marks the task errored and is
    /// returned for the loop's fault policy to handle.
    pub(crate) fn step(&mut self, cx: &mut StepContext<'_>) -> Result<(), SchedulerError> {
        let now = cx.now();
        match self.phase {
            Phase::NotStarted => {
                if let Some(delay) = self.delay {
                    let created = self.created_at.unwrap_or(now);
                    if now < created + delay {
                        return Ok(());
                    }
                }
                self.started = true;
                self.started_at = Some(now);
                self.phase = Phase::Running;
                self.advance_routine(now, cx)
            }
            Phase::Running => {
                if self.timeout_expired(now) {
                    self.force_timeout(now);
                    return Ok(());
                }
                self.advance_routine(now, cx)
            }
            Phase::AwaitingRestart { resume_at } => {
                if self.timeout_expired(now) {
                    self.force_timeout(now);
                    return Ok(());
                }
                if now < resume_at {
                    return Ok(());
                }
                self.routine.reset();
                self.phase = Phase::Running;
                self.advance_routine(now, cx)
            }
            Phase::Completed => Ok(()),
        }
    }

    fn advance_routine(
        &mut self,
        now: Instant,
        cx: &mut StepContext<'_>,
    ) -> Result<(), SchedulerError> {
        match self.routine.step(cx) {
            Ok(StepOutcome::Pending) => Ok(()),
            Ok(StepOutcome::Complete) => {
                if let Some(interval) = self.interval {
                    self.phase = Phase::AwaitingRestart {
                        resume_at: now + interval,
                    };
                } else {
                    self.finish(now, Completion::Normal);
                }
                Ok(())
            }
            Err(source) => {
                self.finish(now, Completion::Errored);
                Err(SchedulerError::TaskFault {
                    id: self.id,
                    source,
                })
            }
        }
    }

    fn timeout_expired(&self, now: Instant) -> bool {
        match (self.timeout, self.started_at) {
            (Some(timeout), Some(started)) => now > started + timeout,
            _ => false,
        }
    }

    fn force_timeout(&mut self, now: Instant) {
        tracing::debug!(id = self.id, "task timed out");
        self.finish(now, Completion::TimedOut);
    }

    fn finish(&mut self, now: Instant, completion: Completion) {
        self.completed = true;
        self.completed_at = Some(now);
        match completion {
            Completion::Normal => {}
            Completion::TimedOut => self.timed_out = true,
            Completion::Errored => self.errored = true,
        }
        self.phase = Phase::Completed;
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("tags", &self.tags)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("bind", &self.bind)
            .field("started", &self.started)
            .field("completed", &self.completed)
            .field("timed_out", &self.timed_out)
            .field("errored", &self.errored)
            .finish_non_exhaustive()
    }
}
