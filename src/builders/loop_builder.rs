//! Builders to construct a configured event loop.

use std::sync::Arc;
use std::time::Duration;

use crate::config::LoopConfig;
use crate::core::event_loop::{EventLoop, RunOptions, TickOptions};
use crate::core::SchedulerError;
use crate::util::clock::Clock;

/// Build an event loop and matching run options from configuration, on the
/// system clock.
pub fn build_event_loop(cfg: &LoopConfig) -> Result<(EventLoop, RunOptions), SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;
    Ok((
        EventLoop::new().with_fault_policy(cfg.fault_policy),
        run_options(cfg),
    ))
}

/// Build an event loop on an explicit clock (e.g. a manual clock in tests).
pub fn build_event_loop_with_clock(
    cfg: &LoopConfig,
    clock: Arc<dyn Clock>,
) -> Result<(EventLoop, RunOptions), SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;
    Ok((
        EventLoop::with_clock(clock).with_fault_policy(cfg.fault_policy),
        run_options(cfg),
    ))
}

fn run_options(cfg: &LoopConfig) -> RunOptions {
    RunOptions {
        pace: cfg.pace_ms.map(Duration::from_millis),
        stop_when_idle: cfg.stop_when_idle,
        tick: TickOptions {
            sort: cfg.sort_each_tick,
            limit: cfg.step_limit,
        },
    }
}
