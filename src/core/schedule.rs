//! Schedule descriptors: policy objects that decide when new tasks become
//! ready, independent of any currently running task.
//!
//! A descriptor owns a routine *factory* plus the metadata (priority, tags,
//! bind) stamped onto every task it materializes. Three kinds exist:
//! [`Timeout`] fires once, [`Interval`] fires repeatedly, and [`Countdown`]
//! is a pausable one-shot timer with explicit states. The [`Schedule`] enum
//! wraps them for storage in the loop.
//!
//! Readiness is a pure function of time: `eta(now)` is the span until the
//! descriptor fires, floored at zero, and a descriptor is ready exactly when
//! its eta is zero.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::core::task::{Routine, Task, TaskId};

/// Unique schedule identifier, drawn from the same generator as task ids.
pub type ScheduleId = u64;

/// Factory producing a fresh routine for each materialized task.
pub type RoutineFactory = Box<dyn Fn() -> Box<dyn Routine> + Send>;

fn boxed_factory<F, R>(factory: F) -> RoutineFactory
where
    F: Fn() -> R + Send + 'static,
    R: Routine + 'static,
{
    Box::new(move || Box::new(factory()) as Box<dyn Routine>)
}

/// Task metadata shared by every descriptor kind.
struct Template {
    factory: RoutineFactory,
    priority: i32,
    tags: BTreeSet<String>,
    bind: bool,
}

impl Template {
    fn new(factory: RoutineFactory) -> Self {
        Self {
            factory,
            priority: 0,
            tags: BTreeSet::new(),
            bind: false,
        }
    }

    fn build(&self) -> Task {
        let mut task = Task::from_boxed((self.factory)())
            .with_priority(self.priority)
            .with_tags(self.tags.iter().cloned());
        if self.bind {
            task = task.bound();
        }
        task
    }
}

/// One-shot descriptor: fires exactly once after its delay.
///
/// The loop removes a `Timeout` from the descriptor set immediately after it
/// produces its task.
pub struct Timeout {
    id: ScheduleId,
    template: Template,
    delay: Duration,
    fire_at: Option<Instant>,
}

impl Timeout {
    /// Creates a one-shot descriptor firing `delay` after registration.
    pub fn new<F, R>(delay: Duration, factory: F) -> Self
    where
        F: Fn() -> R + Send + 'static,
        R: Routine + 'static,
    {
        Self {
            id: crate::util::id::next_id(),
            template: Template::new(boxed_factory(factory)),
            delay,
            fire_at: None,
        }
    }

    /// Sets the priority stamped onto the produced task.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.template.priority = priority;
        self
    }

    /// Adds cancellation tags stamped onto the produced task.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Produced tasks receive scheduler operations through their context.
    #[must_use]
    pub fn bound(mut self) -> Self {
        self.template.bind = true;
        self
    }

    /// Returns the descriptor id.
    pub fn id(&self) -> ScheduleId {
        self.id
    }

    /// Seconds until ready, floored at zero.
    pub fn eta(&self, now: Instant) -> Duration {
        self.fire_at
            .map_or(self.delay, |at| at.saturating_duration_since(now))
    }

    fn arm(&mut self, now: Instant) {
        if self.fire_at.is_none() {
            self.fire_at = Some(now + self.delay);
        }
    }

    fn materialize(&mut self, _now: Instant) -> Task {
        self.template.build()
    }
}

/// Recurring descriptor: fires every `period`.
///
/// With `blocking`, the next firing counts from the *completion* of the
/// previously produced task rather than its creation, so a slow task body
/// self-throttles its own recurrence and at most one produced task is
/// outstanding at a time. With `immediate`, the first firing is ready at
/// registration instead of one full period later.
pub struct Interval {
    id: ScheduleId,
    template: Template,
    period: Duration,
    immediate: bool,
    blocking: bool,
    unblock_after: Option<Duration>,
    reference: Option<Instant>,
    outstanding: Option<(TaskId, Instant)>,
    fired_once: bool,
}

impl Interval {
    /// Creates a recurring descriptor firing every `period`.
    pub fn new<F, R>(period: Duration, factory: F) -> Self
    where
        F: Fn() -> R + Send + 'static,
        R: Routine + 'static,
    {
        Self {
            id: crate::util::id::next_id(),
            template: Template::new(boxed_factory(factory)),
            period,
            immediate: false,
            blocking: false,
            unblock_after: None,
            reference: None,
            outstanding: None,
            fired_once: false,
        }
    }

    /// Sets the priority stamped onto produced tasks.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.template.priority = priority;
        self
    }

    /// Adds cancellation tags stamped onto produced tasks.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Produced tasks receive scheduler operations through their context.
    #[must_use]
    pub fn bound(mut self) -> Self {
        self.template.bind = true;
        self
    }

    /// Makes the first firing ready at registration.
    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// Counts the next firing from the prior task's completion instead of
    /// its creation. At most one produced task is outstanding at a time.
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Escape hatch for the blocking mode: if the outstanding task has not
    /// completed within `span`, stop waiting for it and resume counting from
    /// the moment the hatch fires. Off by default.
    #[must_use]
    pub fn unblock_after(mut self, span: Duration) -> Self {
        self.unblock_after = Some(span);
        self
    }

    /// Returns the descriptor id.
    pub fn id(&self) -> ScheduleId {
        self.id
    }

    /// Seconds until ready, floored at zero.
    ///
    /// While a blocking interval has an outstanding task, the next firing is
    /// at least one full period away (it counts from a completion that has
    /// not happened yet), so the eta reports the period.
    pub fn eta(&self, now: Instant) -> Duration {
        let Some(reference) = self.reference else {
            return if self.immediate {
                Duration::ZERO
            } else {
                self.period
            };
        };
        if self.blocking {
            if let Some((_, spawned_at)) = self.outstanding {
                if let Some(hatch) = self.unblock_after {
                    if now >= spawned_at + hatch {
                        return (spawned_at + hatch + self.period).saturating_duration_since(now);
                    }
                }
                return self.period;
            }
        }
        let next = if self.immediate && !self.fired_once {
            reference
        } else {
            reference + self.period
        };
        next.saturating_duration_since(now)
    }

    fn arm(&mut self, now: Instant) {
        if self.reference.is_none() {
            self.reference = Some(now);
        }
    }

    /// Resolves the escape hatch, then reports readiness.
    fn poll_ready(&mut self, now: Instant) -> bool {
        if self.blocking {
            if let Some((task_id, spawned_at)) = self.outstanding {
                if let Some(hatch) = self.unblock_after {
                    if now >= spawned_at + hatch {
                        tracing::warn!(
                            schedule_id = self.id,
                            task_id,
                            "blocking interval gave up waiting on outstanding task"
                        );
                        self.outstanding = None;
                        self.reference = Some(spawned_at + hatch);
                    }
                }
            }
            if self.outstanding.is_some() {
                return false;
            }
        }
        self.eta(now).is_zero()
    }

    fn materialize(&mut self, now: Instant) -> Task {
        let task = self.template.build();
        self.fired_once = true;
        if self.blocking {
            self.outstanding = Some((task.id(), now));
        } else {
            self.reference = Some(now);
        }
        task
    }

    /// Notes that a produced task left the loop, unblocking the recurrence.
    fn on_task_removed(&mut self, task_id: TaskId, at: Instant) {
        if let Some((outstanding_id, _)) = self.outstanding {
            if outstanding_id == task_id {
                self.outstanding = None;
                self.reference = Some(at);
            }
        }
    }
}

/// Explicit state of a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// Counting down towards the deadline.
    Waiting,
    /// Frozen; remaining time is preserved.
    Paused,
    /// The task was produced. Terminal; never re-armed.
    Completed,
}

/// Pausable one-shot timer.
///
/// `Waiting → Paused` and back preserve remaining time; [`Countdown::reset`]
/// returns to the full initial duration (paused); [`Countdown::restart`]
/// resets then resumes. Producing its task transitions the countdown to
/// [`CountdownState::Completed`], where it stays.
pub struct Countdown {
    id: ScheduleId,
    template: Template,
    duration: Duration,
    state: CountdownState,
    deadline: Option<Instant>,
    remaining: Duration,
}

impl Countdown {
    /// Creates a countdown that fires `duration` after registration.
    pub fn new<F, R>(duration: Duration, factory: F) -> Self
    where
        F: Fn() -> R + Send + 'static,
        R: Routine + 'static,
    {
        Self {
            id: crate::util::id::next_id(),
            template: Template::new(boxed_factory(factory)),
            duration,
            state: CountdownState::Waiting,
            deadline: None,
            remaining: duration,
        }
    }

    /// Sets the priority stamped onto the produced task.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.template.priority = priority;
        self
    }

    /// Adds cancellation tags stamped onto the produced task.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// The produced task receives scheduler operations through its context.
    #[must_use]
    pub fn bound(mut self) -> Self {
        self.template.bind = true;
        self
    }

    /// Returns the descriptor id.
    pub fn id(&self) -> ScheduleId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// The configured initial duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time left on the timer: live while waiting, frozen while paused,
    /// zero once completed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.state {
            CountdownState::Waiting => self
                .deadline
                .map_or(self.remaining, |d| d.saturating_duration_since(now)),
            CountdownState::Paused => self.remaining,
            CountdownState::Completed => Duration::ZERO,
        }
    }

    /// Freezes the countdown, preserving remaining time. No-op unless waiting.
    pub fn pause(&mut self, now: Instant) {
        if self.state != CountdownState::Waiting {
            return;
        }
        self.remaining = self.remaining(now);
        self.deadline = None;
        self.state = CountdownState::Paused;
    }

    /// Resumes a paused countdown from its preserved remaining time.
    pub fn resume(&mut self, now: Instant) {
        if self.state != CountdownState::Paused {
            return;
        }
        self.deadline = Some(now + self.remaining);
        self.state = CountdownState::Waiting;
    }

    /// Returns to the full initial duration, paused.
    pub fn reset(&mut self) {
        if self.state == CountdownState::Completed {
            return;
        }
        self.remaining = self.duration;
        self.deadline = None;
        self.state = CountdownState::Paused;
    }

    /// Resets, then resumes: a fresh countdown from the initial duration.
    pub fn restart(&mut self, now: Instant) {
        self.reset();
        self.resume(now);
    }

    /// Seconds until ready, floored at zero. Paused and completed countdowns
    /// never become ready regardless of this value.
    pub fn eta(&self, now: Instant) -> Duration {
        self.remaining(now)
    }

    fn arm(&mut self, now: Instant) {
        if self.state == CountdownState::Waiting && self.deadline.is_none() {
            self.deadline = Some(now + self.remaining);
        }
    }

    fn poll_ready(&mut self, now: Instant) -> bool {
        self.state == CountdownState::Waiting && self.eta(now).is_zero()
    }

    fn materialize(&mut self, _now: Instant) -> Task {
        self.state = CountdownState::Completed;
        self.deadline = None;
        self.template.build()
    }
}

/// A schedule descriptor of any kind, as stored by the loop.
pub enum Schedule {
    /// One-shot.
    Timeout(Timeout),
    /// Recurring.
    Interval(Interval),
    /// Pausable one-shot.
    Countdown(Countdown),
}

impl Schedule {
    /// Returns the descriptor id.
    pub fn id(&self) -> ScheduleId {
        match self {
            Self::Timeout(t) => t.id(),
            Self::Interval(i) => i.id(),
            Self::Countdown(c) => c.id(),
        }
    }

    /// Seconds until ready, floored at zero.
    pub fn eta(&self, now: Instant) -> Duration {
        match self {
            Self::Timeout(t) => t.eta(now),
            Self::Interval(i) => i.eta(now),
            Self::Countdown(c) => c.eta(now),
        }
    }

    /// Whether the descriptor would fire at `now`, without side effects.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self {
            Self::Timeout(t) => t.fire_at.is_some() && t.eta(now).is_zero(),
            Self::Interval(i) => {
                if i.blocking && i.outstanding.is_some() && i.unblock_after.is_none() {
                    false
                } else {
                    i.eta(now).is_zero()
                }
            }
            Self::Countdown(c) => c.state == CountdownState::Waiting && c.eta(now).is_zero(),
        }
    }

    /// Borrows the interval descriptor, if that is what this is.
    pub fn as_interval_mut(&mut self) -> Option<&mut Interval> {
        match self {
            Self::Interval(i) => Some(i),
            _ => None,
        }
    }

    /// Borrows the countdown descriptor, if that is what this is.
    pub fn as_countdown_mut(&mut self) -> Option<&mut Countdown> {
        match self {
            Self::Countdown(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn arm(&mut self, now: Instant) {
        match self {
            Self::Timeout(t) => t.arm(now),
            Self::Interval(i) => i.arm(now),
            Self::Countdown(c) => c.arm(now),
        }
    }

    pub(crate) fn poll_ready(&mut self, now: Instant) -> bool {
        match self {
            Self::Timeout(t) => t.fire_at.is_some_and(|at| now >= at),
            Self::Interval(i) => i.poll_ready(now),
            Self::Countdown(c) => c.poll_ready(now),
        }
    }

    pub(crate) fn materialize(&mut self, now: Instant) -> Task {
        match self {
            Self::Timeout(t) => t.materialize(now),
            Self::Interval(i) => i.materialize(now),
            Self::Countdown(c) => c.materialize(now),
        }
    }

    /// Whether the loop drops the descriptor right after it fires.
    pub(crate) fn removed_after_fire(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub(crate) fn on_task_removed(&mut self, task_id: TaskId, at: Instant) {
        if let Self::Interval(i) = self {
            i.on_task_removed(task_id, at);
        }
    }
}

impl From<Timeout> for Schedule {
    fn from(value: Timeout) -> Self {
        Self::Timeout(value)
    }
}

impl From<Interval> for Schedule {
    fn from(value: Interval) -> Self {
        Self::Interval(value)
    }
}

impl From<Countdown> for Schedule {
    fn from(value: Countdown) -> Self {
        Self::Countdown(value)
    }
}
