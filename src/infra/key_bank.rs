//! Debounced multi-key reader over a bulk key-bus source.
//!
//! One bus read samples every key at once; [`KeyBank`] keeps the previous
//! and current bulk samples and answers per-key edge queries from them,
//! the same two-sample scheme as [`super::button::DebouncedButton`] but
//! shared across the whole bank.
//!
//! As with the single-button reader, the click-counting and hold-time
//! helpers are blocking poll loops and must never run inside a cooperative
//! task step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::util::clock::{Clock, ManualClock, SystemClock};

/// Bulk press state provider: one poll reads every key.
pub trait KeyBusSource {
    /// Reads the current press state of every key on the bus.
    fn read_keys(&mut self) -> Vec<bool>;
}

/// Debounced view over a bank of keys sampled in bulk.
pub struct KeyBank<S> {
    source: S,
    clock: Arc<dyn Clock>,
    previously_pressed: Vec<bool>,
    currently_pressed: Vec<bool>,
    click_budget: Duration,
    last_activity: Instant,
}

impl<S: KeyBusSource> KeyBank<S> {
    /// Creates a bank over `source` on the system clock.
    pub fn new(source: S) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    /// Creates a bank on an explicit clock.
    pub fn with_clock(source: S, clock: Arc<dyn Clock>) -> Self {
        let last_activity = clock.now();
        Self {
            source,
            clock,
            previously_pressed: Vec::new(),
            currently_pressed: Vec::new(),
            click_budget: Duration::from_millis(400),
            last_activity,
        }
    }

    /// Sets the rolling time budget for counting consecutive clicks.
    /// Default 0.4 s.
    #[must_use]
    pub fn with_click_budget(mut self, budget: Duration) -> Self {
        self.click_budget = budget;
        self
    }

    /// Samples the bus once, shifting the two-sample window for every key.
    pub fn update(&mut self) {
        let current = self.source.read_keys();
        self.previously_pressed = std::mem::replace(&mut self.currently_pressed, current);
        if self.previously_pressed != self.currently_pressed {
            self.last_activity = self.clock.now();
        }
    }

    /// Number of keys seen on the last bus read.
    pub fn key_count(&self) -> usize {
        self.currently_pressed.len()
    }

    /// Last time any key changed state.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether key `idx` is currently pressed. Samples the bus.
    pub fn pressed(&mut self, idx: usize) -> bool {
        self.update();
        self.current(idx)
    }

    /// Whether key `idx` rose between the two most recent samples.
    /// Does not sample; pair with [`KeyBank::update`].
    pub fn clicked(&self, idx: usize) -> bool {
        !self.previous(idx) && self.current(idx)
    }

    /// Whether key `idx` fell between the two most recent samples.
    /// Does not sample; pair with [`KeyBank::update`].
    pub fn released(&self, idx: usize) -> bool {
        self.previous(idx) && !self.current(idx)
    }

    /// Counts clicks of key `idx` repeated within the rolling budget.
    ///
    /// Returns 0 unless the most recent window shows a click. Blocks for at
    /// least one full budget after the last counted click.
    pub fn consecutive_clicks(&mut self, idx: usize) -> u32 {
        if !self.clicked(idx) {
            return 0;
        }

        let mut times_clicked = 1;
        let mut last_click = self.clock.now();

        while self.clock.now() < last_click + self.click_budget {
            self.update();
            if !self.clicked(idx) {
                continue;
            }
            times_clicked += 1;
            last_click = self.clock.now();
        }

        times_clicked
    }

    /// Blocks until key `idx` is released and returns how long it was held.
    /// Returns zero if it is not currently pressed.
    pub fn hold_time(&mut self, idx: usize) -> Duration {
        if !self.pressed(idx) {
            return Duration::ZERO;
        }

        let hold_start = self.clock.now();
        while self.pressed(idx) {}
        self.clock.now().saturating_duration_since(hold_start)
    }

    fn current(&self, idx: usize) -> bool {
        self.currently_pressed.get(idx).copied().unwrap_or(false)
    }

    fn previous(&self, idx: usize) -> bool {
        self.previously_pressed.get(idx).copied().unwrap_or(false)
    }
}

/// Scripted bus source for tests.
///
/// Replays a fixed sequence of bulk samples, then holds the final one. Can
/// advance a shared [`ManualClock`] on every read.
pub struct MemoryBusSource {
    frames: std::collections::VecDeque<Vec<bool>>,
    idle: Vec<bool>,
    auto_advance: Option<(Arc<ManualClock>, Duration)>,
}

impl MemoryBusSource {
    /// Creates a source replaying `frames`, then reading all-released.
    pub fn new<I: IntoIterator<Item = Vec<bool>>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            idle: Vec::new(),
            auto_advance: None,
        }
    }

    /// Advances `clock` by `step` on every read.
    #[must_use]
    pub fn advancing(mut self, clock: Arc<ManualClock>, step: Duration) -> Self {
        self.auto_advance = Some((clock, step));
        self
    }
}

impl KeyBusSource for MemoryBusSource {
    fn read_keys(&mut self) -> Vec<bool> {
        if let Some((clock, step)) = &self.auto_advance {
            clock.advance(*step);
        }
        match self.frames.pop_front() {
            Some(frame) => {
                self.idle = vec![false; frame.len()];
                frame
            }
            None => self.idle.clone(),
        }
    }
}
