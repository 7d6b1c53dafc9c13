//! The event loop: owns live tasks and schedule descriptors and drives them
//! with a deterministic tick.
//!
//! One tick materializes every ready descriptor into a task, optionally
//! orders the active set, advances each task by exactly one step, applies
//! mutations queued by bound routines, and prunes completed tasks. [`run`]
//! repeats ticks until a stop is requested or the loop drains.
//!
//! Everything happens on the caller's thread; the only cross-thread
//! touchpoint is the stop flag, an `AtomicBool` a signal handler can raise.
//!
//! [`run`]: EventLoop::run

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::error::SchedulerError;
use crate::core::schedule::{Schedule, ScheduleId};
use crate::core::task::{Task, TaskId};
use crate::util::clock::{Clock, SystemClock};

/// What the loop does with a fault raised from a task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Return the first fault from `tick`/`run` once the tick finishes
    /// stepping the remaining tasks.
    #[default]
    Propagate,
    /// Log the fault and keep going.
    LogAndContinue,
}

/// Per-tick knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOptions {
    /// Stable-sort the active set by priority order before stepping.
    /// Off by default; insertion order is often already acceptable.
    pub sort: bool,
    /// Advance at most this many tasks this tick. Bounds per-tick work for
    /// latency-sensitive callers; unstepped tasks wait for the next tick.
    pub limit: Option<usize>,
}

impl TickOptions {
    /// Options with sorting enabled.
    #[must_use]
    pub fn sorted() -> Self {
        Self {
            sort: true,
            limit: None,
        }
    }

    /// Caps the number of tasks advanced per tick.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Knobs for [`EventLoop::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Sleep between ticks. `None` spins as fast as tasks allow.
    pub pace: Option<Duration>,
    /// Stop once both the active set and the descriptor set are empty.
    pub stop_when_idle: bool,
    /// Options applied to every tick.
    pub tick: TickOptions,
}

/// Mutation queued by a bound routine, applied at the tick boundary.
enum Command {
    Spawn(Task),
    Register(Schedule),
    CancelIds(Vec<TaskId>),
    CancelTags(BTreeSet<String>),
    Stop,
}

/// What a routine sees while it is being stepped.
///
/// The read side (time, tick counter, active-set size) is always available.
/// The write side queues loop mutations and is reserved for tasks created
/// with [`Task::bound`]; on an unbound task every mutating method returns
/// [`SchedulerError::NotBound`]. Queued mutations take effect at the tick
/// boundary, never mid-step.
pub struct StepContext<'a> {
    now: Instant,
    tick: u64,
    active: usize,
    commands: Option<&'a mut Vec<Command>>,
}

impl StepContext<'_> {
    /// The loop's clock reading for this tick.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// The current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Size of the active set at the start of this tick's stepping phase.
    pub fn active_tasks(&self) -> usize {
        self.active
    }

    /// Queues a task for admission at the tick boundary.
    pub fn spawn(&mut self, task: Task) -> Result<TaskId, SchedulerError> {
        let id = task.id();
        self.push(Command::Spawn(task))?;
        Ok(id)
    }

    /// Queues a schedule descriptor for registration at the tick boundary.
    pub fn register(&mut self, schedule: impl Into<Schedule>) -> Result<ScheduleId, SchedulerError> {
        let schedule = schedule.into();
        let id = schedule.id();
        self.push(Command::Register(schedule))?;
        Ok(id)
    }

    /// Queues cancellation of one task by id.
    pub fn cancel_id(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        self.push(Command::CancelIds(vec![id]))
    }

    /// Queues cancellation of every task whose tag set contains all of
    /// `group`. An empty group cancels nothing.
    pub fn cancel_tags<I, S>(&mut self, group: I) -> Result<(), SchedulerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group: BTreeSet<String> = group.into_iter().map(Into::into).collect();
        self.push(Command::CancelTags(group))
    }

    /// Requests that [`EventLoop::run`] stop after this tick.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        self.push(Command::Stop)
    }

    fn push(&mut self, command: Command) -> Result<(), SchedulerError> {
        match self.commands.as_mut() {
            Some(commands) => {
                commands.push(command);
                Ok(())
            }
            None => Err(SchedulerError::NotBound),
        }
    }

    /// A context with no loop behind it, for unit tests of step logic.
    #[cfg(test)]
    pub(crate) fn detached(now: Instant) -> StepContext<'static> {
        StepContext {
            now,
            tick: 0,
            active: 0,
            commands: None,
        }
    }
}

/// Cooperative scheduler owning an active set of tasks and a set of schedule
/// descriptors.
///
/// Process-lifetime state with no persistence; reset only by [`clear`].
///
/// [`clear`]: EventLoop::clear
pub struct EventLoop {
    tasks: Vec<Task>,
    schedules: Vec<Schedule>,
    clock: Arc<dyn Clock>,
    fault_policy: FaultPolicy,
    commands: Vec<Command>,
    stop: Arc<AtomicBool>,
    ticks: u64,
    rate_ticks: u64,
    rate_since: Instant,
}

impl EventLoop {
    /// Creates a loop on the system monotonic clock with the default fault
    /// policy.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a loop on an explicit clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let rate_since = clock.now();
        Self {
            tasks: Vec::new(),
            schedules: Vec::new(),
            clock,
            fault_policy: FaultPolicy::default(),
            commands: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            ticks: 0,
            rate_ticks: 0,
            rate_since,
        }
    }

    /// Sets the fault policy.
    #[must_use]
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// The loop's clock reading.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Admits a task into the active set, stamping its admission time.
    pub fn add(&mut self, task: Task) -> TaskId {
        let now = self.clock.now();
        let id = task.id();
        self.admit(task, now);
        id
    }

    /// Registers a schedule descriptor, arming its deadline.
    pub fn register(&mut self, schedule: impl Into<Schedule>) -> ScheduleId {
        let now = self.clock.now();
        let mut schedule = schedule.into();
        schedule.arm(now);
        let id = schedule.id();
        tracing::debug!(schedule_id = id, "schedule registered");
        self.schedules.push(schedule);
        id
    }

    /// Removes one task by id. Returns whether it was present.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let now = self.clock.now();
        self.remove_tasks(|task| task.id() == id, now) > 0
    }

    /// Removes every task whose id appears in `ids`. Returns the count.
    pub fn cancel_ids(&mut self, ids: &[TaskId]) -> usize {
        let now = self.clock.now();
        self.remove_tasks(|task| ids.contains(&task.id()), now)
    }

    /// Removes every task whose tag set is a superset of `group` (all tags
    /// in the group present on the task). An empty group cancels nothing.
    /// Returns the count.
    pub fn cancel_tags<I, S>(&mut self, group: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group: BTreeSet<String> = group.into_iter().map(Into::into).collect();
        if group.is_empty() {
            return 0;
        }
        let now = self.clock.now();
        let removed =
            self.remove_tasks(|task| group.iter().all(|tag| task.tags().contains(tag)), now);
        tracing::debug!(?group, removed, "cancelled by tags");
        removed
    }

    /// Removes a schedule descriptor by id. Returns whether it was present.
    pub fn remove_schedule(&mut self, id: ScheduleId) -> bool {
        let before = self.schedules.len();
        self.schedules.retain(|schedule| schedule.id() != id);
        self.schedules.len() < before
    }

    /// Drops every task and descriptor.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.schedules.clear();
        self.commands.clear();
    }

    /// Number of live tasks in the active set.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the active set is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of registered schedule descriptors.
    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }

    /// Current eta of every registered descriptor, for diagnostics.
    pub fn schedule_etas(&self) -> Vec<(ScheduleId, Duration)> {
        let now = self.clock.now();
        self.schedules
            .iter()
            .map(|schedule| (schedule.id(), schedule.eta(now)))
            .collect()
    }

    /// Borrows a registered descriptor for inspection or control
    /// (e.g. pausing a countdown).
    pub fn schedule_mut(&mut self, id: ScheduleId) -> Option<&mut Schedule> {
        self.schedules.iter_mut().find(|schedule| schedule.id() == id)
    }

    /// Borrows a live task by id.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// The shared stop flag. Raise it (from a Ctrl-C handler, another
    /// thread, or a bound routine via [`StepContext::stop`]) to make
    /// [`run`](EventLoop::run) exit cleanly at the next tick boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Total ticks executed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Average ticks per second since construction or the last
    /// [`reset_tick_rate`](EventLoop::reset_tick_rate).
    pub fn ticks_per_second(&self) -> f64 {
        let elapsed = self.clock.now().saturating_duration_since(self.rate_since);
        if elapsed.is_zero() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ticks = self.rate_ticks as f64;
        ticks / elapsed.as_secs_f64()
    }

    /// Resets the tick-rate window.
    pub fn reset_tick_rate(&mut self) {
        self.rate_ticks = 0;
        self.rate_since = self.clock.now();
    }

    /// Runs one tick: materialize ready descriptors, order, advance every
    /// task by one step, apply queued mutations, prune completed tasks.
    ///
    /// # Errors
    ///
    /// Under [`FaultPolicy::Propagate`], returns the first routine fault of
    /// the tick (after the remaining tasks have still been stepped). Timeouts
    /// are not errors.
    pub fn tick(&mut self, opts: &TickOptions) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        self.ticks += 1;
        self.rate_ticks += 1;

        self.materialize_ready(now);

        if opts.sort {
            self.tasks.sort_by(|a, b| {
                b.priority()
                    .cmp(&a.priority())
                    .then_with(|| a.created_at().cmp(&b.created_at()))
                    .then_with(|| a.id().cmp(&b.id()))
            });
        }

        let budget = opts.limit.unwrap_or(usize::MAX);
        let tick = self.ticks;
        let active = self.tasks.len();
        let policy = self.fault_policy;
        let mut queued = std::mem::take(&mut self.commands);
        let mut first_fault = None;

        for task in self.tasks.iter_mut().take(budget) {
            let commands = if task.is_bound() {
                Some(&mut queued)
            } else {
                None
            };
            let mut cx = StepContext {
                now,
                tick,
                active,
                commands,
            };
            if let Err(fault) = task.step(&mut cx) {
                match policy {
                    FaultPolicy::Propagate if first_fault.is_none() => first_fault = Some(fault),
                    _ => tracing::error!(error = %fault, "task step faulted"),
                }
            }
        }
        self.commands = queued;

        self.apply_commands(now);
        self.prune(now);

        first_fault.map_or(Ok(()), Err)
    }

    /// Repeats ticks until the stop flag is raised or, with
    /// `stop_when_idle`, until both the active set and the descriptor set
    /// are empty. Sleeps `pace` between ticks when configured.
    ///
    /// # Errors
    ///
    /// Under [`FaultPolicy::Propagate`], the first routine fault halts the
    /// loop and is returned.
    pub fn run(&mut self, opts: &RunOptions) -> Result<(), SchedulerError> {
        self.stop.store(false, Ordering::Relaxed);
        tracing::info!("event loop running");
        loop {
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!("event loop stopped by request");
                return Ok(());
            }
            if opts.stop_when_idle && self.tasks.is_empty() && self.schedules.is_empty() {
                tracing::info!("event loop idle, stopping");
                return Ok(());
            }
            self.tick(&opts.tick)?;
            if let Some(pace) = opts.pace {
                std::thread::sleep(pace);
            }
        }
    }

    fn admit(&mut self, mut task: Task, now: Instant) {
        task.admit(now);
        tracing::debug!(id = task.id(), priority = task.priority(), "task admitted");
        self.tasks.push(task);
    }

    fn materialize_ready(&mut self, now: Instant) {
        let mut idx = 0;
        while idx < self.schedules.len() {
            if self.schedules[idx].poll_ready(now) {
                let task = self.schedules[idx].materialize(now);
                tracing::debug!(
                    schedule_id = self.schedules[idx].id(),
                    task_id = task.id(),
                    "schedule fired"
                );
                let one_shot = self.schedules[idx].removed_after_fire();
                self.admit(task, now);
                if one_shot {
                    self.schedules.remove(idx);
                    continue;
                }
            }
            idx += 1;
        }
    }

    fn apply_commands(&mut self, now: Instant) {
        let commands: Vec<Command> = self.commands.drain(..).collect();
        for command in commands {
            match command {
                Command::Spawn(task) => self.admit(task, now),
                Command::Register(mut schedule) => {
                    schedule.arm(now);
                    tracing::debug!(schedule_id = schedule.id(), "schedule registered");
                    self.schedules.push(schedule);
                }
                Command::CancelIds(ids) => {
                    self.remove_tasks(|task| ids.contains(&task.id()), now);
                }
                Command::CancelTags(group) => {
                    if !group.is_empty() {
                        self.remove_tasks(
                            |task| group.iter().all(|tag| task.tags().contains(tag)),
                            now,
                        );
                    }
                }
                Command::Stop => self.stop.store(true, Ordering::Relaxed),
            }
        }
    }

    /// Removes matching tasks and notifies descriptors that reference them.
    fn remove_tasks<F>(&mut self, pred: F, at: Instant) -> usize
    where
        F: Fn(&Task) -> bool,
    {
        let mut removed = Vec::new();
        self.tasks.retain(|task| {
            if pred(task) {
                removed.push(task.id());
                false
            } else {
                true
            }
        });
        for id in &removed {
            for schedule in &mut self.schedules {
                schedule.on_task_removed(*id, at);
            }
        }
        removed.len()
    }

    fn prune(&mut self, now: Instant) {
        let mut finished = Vec::new();
        self.tasks.retain(|task| {
            if task.is_completed() {
                finished.push((task.id(), task.completed_at().unwrap_or(now)));
                false
            } else {
                true
            }
        });
        if !finished.is_empty() {
            tracing::trace!(count = finished.len(), "pruned completed tasks");
        }
        for (id, at) in finished {
            for schedule in &mut self.schedules {
                schedule.on_task_removed(id, at);
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
