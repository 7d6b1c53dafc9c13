//! Integration tests for the tick loop.
//!
//! These validate:
//! 1. Priority ordering with FIFO and id tie-breaks within a tick
//! 2. Suspension and resumption across ticks
//! 3. Poll-based timeouts that never raise
//! 4. Tag-superset cancellation at the loop surface
//! 5. Fault isolation and the two fault policies
//! 6. Bound routines mutating the loop through their step context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickloop::core::{
    EventLoop, FaultPolicy, RunOptions, SchedulerError, StepOutcome, SyncDelay, Task, TickOptions,
};
use tickloop::util::clock::ManualClock;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recording_task(log: &Log, name: &'static str) -> Task {
    let log = Arc::clone(log);
    Task::from_fn(move |_cx| {
        log.lock().unwrap().push(name);
        Ok(StepOutcome::Complete)
    })
}

#[test]
fn higher_priority_steps_first_regardless_of_insertion_order() {
    tickloop::util::telemetry::init_tracing();
    let log: Log = Arc::default();
    let mut el = EventLoop::new();

    el.add(recording_task(&log, "low").with_priority(-5));
    el.add(recording_task(&log, "high").with_priority(10));
    el.add(recording_task(&log, "mid"));

    el.tick(&TickOptions::sorted()).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["high", "mid", "low"]);
    assert!(el.is_empty());
}

#[test]
fn equal_priority_breaks_ties_by_admission_then_id() {
    let clock = Arc::new(ManualClock::new());
    let log: Log = Arc::default();
    let mut el = EventLoop::with_clock(clock.clone());

    // Same admission instant: id (construction order) decides.
    el.add(recording_task(&log, "first"));
    el.add(recording_task(&log, "second"));
    clock.advance(Duration::from_millis(1));
    // Later admission sorts after both.
    el.add(recording_task(&log, "third"));

    el.tick(&TickOptions::sorted()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn suspended_task_resumes_where_it_left_off() {
    let log: Log = Arc::default();
    let recorded = Arc::clone(&log);
    let mut el = EventLoop::new();

    let mut phase = 0_u32;
    el.add(Task::from_fn(move |_cx| {
        phase += 1;
        recorded.lock().unwrap().push(if phase == 1 { "a" } else { "b" });
        if phase < 2 {
            Ok(StepOutcome::Pending)
        } else {
            Ok(StepOutcome::Complete)
        }
    }));

    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(el.len(), 1);
    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    assert!(el.is_empty());
}

#[test]
fn sync_delay_yields_at_least_once_even_for_zero_seconds() {
    let mut el = EventLoop::new();

    let mut delay: Option<SyncDelay> = None;
    el.add(Task::from_fn(move |cx| {
        let wait = delay.get_or_insert_with(|| SyncDelay::new(cx.now(), Duration::ZERO));
        Ok(wait.poll(cx.now()))
    }));

    // First tick: the zero-second delay still suspends once.
    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(el.len(), 1);

    // Second tick: done.
    el.tick(&TickOptions::default()).unwrap();
    assert!(el.is_empty());
}

#[test]
fn timeout_drops_runaway_task_without_error() {
    let clock = Arc::new(ManualClock::new());
    let mut el = EventLoop::with_clock(clock.clone());

    el.add(
        Task::from_fn(|_cx| Ok(StepOutcome::Pending)).with_timeout(Duration::from_secs(1)),
    );

    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(el.len(), 1);

    clock.advance(Duration::from_millis(1100));
    el.tick(&TickOptions::default()).unwrap();
    assert!(el.is_empty());
}

#[test]
fn delayed_task_waits_for_its_delay() {
    let clock = Arc::new(ManualClock::new());
    let log: Log = Arc::default();
    let mut el = EventLoop::with_clock(clock.clone());

    el.add(recording_task(&log, "late").with_delay(Duration::from_secs(5)));

    el.tick(&TickOptions::default()).unwrap();
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(el.len(), 1);

    clock.advance(Duration::from_secs(5));
    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["late"]);
}

#[test]
fn step_limit_caps_work_per_tick() {
    let log: Log = Arc::default();
    let mut el = EventLoop::new();

    el.add(recording_task(&log, "a"));
    el.add(recording_task(&log, "b"));
    el.add(recording_task(&log, "c"));

    el.tick(&TickOptions::default().with_limit(2)).unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(el.len(), 1);

    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn tag_group_cancellation_requires_a_superset() {
    let log: Log = Arc::default();
    let mut el = EventLoop::new();

    let victim = el.add(
        recording_task(&log, "victim").with_tags(["x", "y", "z"]),
    );
    let survivor = el.add(recording_task(&log, "survivor").with_tag("x"));

    let removed = el.cancel_tags(["x", "y"]);
    assert_eq!(removed, 1);
    assert!(el.task(victim).is_none());
    assert!(el.task(survivor).is_some());

    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
}

#[test]
fn cancel_by_id_removes_only_that_task() {
    let log: Log = Arc::default();
    let mut el = EventLoop::new();

    let a = el.add(recording_task(&log, "a"));
    let b = el.add(recording_task(&log, "b"));

    assert!(el.cancel(a));
    assert!(!el.cancel(a));
    assert_eq!(el.len(), 1);
    assert!(el.task(b).is_some());
}

#[test]
fn fault_propagates_but_does_not_block_the_rest_of_the_tick() {
    let log: Log = Arc::default();
    let mut el = EventLoop::new();

    el.add(
        Task::from_fn(|_cx| Err(anyhow::anyhow!("sensor offline"))).with_priority(10),
    );
    el.add(recording_task(&log, "after"));

    let err = el.tick(&TickOptions::sorted()).unwrap_err();
    assert!(matches!(err, SchedulerError::TaskFault { .. }));

    // The fault did not stop the lower-priority task from running.
    assert_eq!(*log.lock().unwrap(), vec!["after"]);
    // Both the errored and the completed task were pruned.
    assert!(el.is_empty());
}

#[test]
fn lenient_policy_swallows_faults() {
    let log: Log = Arc::default();
    let mut el = EventLoop::new().with_fault_policy(FaultPolicy::LogAndContinue);

    el.add(Task::from_fn(|_cx| Err(anyhow::anyhow!("boom"))));
    el.add(recording_task(&log, "fine"));

    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["fine"]);
}

#[test]
fn bound_task_can_spawn_and_cancel_through_its_context() {
    let log: Log = Arc::default();
    let spawn_log = Arc::clone(&log);
    let mut el = EventLoop::new();

    let doomed = el.add(
        Task::from_fn(|_cx| Ok(StepOutcome::Pending)).with_tag("doomed"),
    );

    el.add(
        Task::from_fn(move |cx| {
            let inner = Arc::clone(&spawn_log);
            cx.spawn(Task::from_fn(move |_cx| {
                inner.lock().unwrap().push("spawned");
                Ok(StepOutcome::Complete)
            }))?;
            cx.cancel_tags(["doomed"])?;
            Ok(StepOutcome::Complete)
        })
        .bound(),
    );

    // Mutations land at the tick boundary: after one tick the doomed task is
    // gone and the spawned task is live but not yet stepped.
    el.tick(&TickOptions::default()).unwrap();
    assert!(el.task(doomed).is_none());
    assert_eq!(el.len(), 1);
    assert!(log.lock().unwrap().is_empty());

    el.tick(&TickOptions::default()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["spawned"]);
}

#[test]
fn unbound_task_is_refused_scheduler_ops() {
    let saw_not_bound = Arc::new(AtomicBool::new(false));
    let saw = Arc::clone(&saw_not_bound);
    let mut el = EventLoop::new();

    el.add(Task::from_fn(move |cx| {
        match cx.stop() {
            Err(SchedulerError::NotBound) => saw.store(true, Ordering::Relaxed),
            _ => {}
        }
        Ok(StepOutcome::Complete)
    }));

    el.tick(&TickOptions::default()).unwrap();
    assert!(saw_not_bound.load(Ordering::Relaxed));
}

#[test]
fn run_stops_when_idle() {
    let log: Log = Arc::default();
    let mut el = EventLoop::new();

    el.add(recording_task(&log, "only"));

    el.run(&RunOptions {
        stop_when_idle: true,
        ..RunOptions::default()
    })
    .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["only"]);
    assert_eq!(el.ticks(), 1);
}

#[test]
fn run_honors_the_stop_flag() {
    let mut el = EventLoop::new();
    let stop = el.stop_flag();

    // A bound task raises the stop flag from inside the loop.
    el.add(
        Task::from_fn(|cx| {
            cx.stop()?;
            Ok(StepOutcome::Pending)
        })
        .bound(),
    );

    el.run(&RunOptions::default()).unwrap();
    assert!(stop.load(Ordering::Relaxed));
    // The pending task was never completed, only the loop stopped.
    assert_eq!(el.len(), 1);
}

#[test]
fn clear_resets_the_loop() {
    let mut el = EventLoop::new();
    el.add(Task::from_fn(|_cx| Ok(StepOutcome::Pending)));
    el.add(Task::from_fn(|_cx| Ok(StepOutcome::Pending)));
    assert_eq!(el.len(), 2);

    el.clear();
    assert!(el.is_empty());
    assert_eq!(el.schedule_count(), 0);
}
