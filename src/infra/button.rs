//! Debounced single-button reader over a pluggable press source.
//!
//! [`DebouncedButton`] keeps a two-sample window over a raw [`PressSource`]
//! and derives edge queries from it: `clicked` is a rising edge, `released`
//! a falling edge, both observed across one update of the window.
//!
//! The click-counting and hold-time helpers are **blocking poll loops**:
//! they repeatedly read the source until a time budget lapses or the button
//! is released. They belong in dedicated input code only — never call them
//! from inside a cooperative task step, or they will starve the loop for
//! their whole duration.

use std::sync::Arc;
use std::time::Duration;

use crate::util::clock::{Clock, ManualClock, SystemClock};

/// Raw press state provider, polled once per query.
pub trait PressSource {
    /// Reads the current (debounced) press state.
    fn pressed(&mut self) -> bool;
}

/// Debounced button with edge queries and blocking wait helpers.
pub struct DebouncedButton<S> {
    source: S,
    clock: Arc<dyn Clock>,
    previously_pressed: bool,
    currently_pressed: bool,
    click_budget: Duration,
}

impl<S: PressSource> DebouncedButton<S> {
    /// Creates a reader over `source` on the system clock.
    pub fn new(source: S) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    /// Creates a reader on an explicit clock.
    pub fn with_clock(source: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            previously_pressed: false,
            currently_pressed: false,
            click_budget: Duration::from_millis(500),
        }
    }

    /// Sets the rolling time budget for counting consecutive clicks.
    /// Default 0.5 s.
    #[must_use]
    pub fn with_click_budget(mut self, budget: Duration) -> Self {
        self.click_budget = budget;
        self
    }

    fn update(&mut self) {
        self.previously_pressed = self.currently_pressed;
        self.currently_pressed = self.source.pressed();
    }

    /// Whether the button is currently pressed. Reads the source directly.
    pub fn pressed(&mut self) -> bool {
        self.source.pressed()
    }

    /// Whether the button was not pressed at the previous sample and is now.
    /// Advances the two-sample window.
    pub fn clicked(&mut self) -> bool {
        self.update();
        !self.previously_pressed && self.currently_pressed
    }

    /// Whether the button was pressed at the previous sample and no longer
    /// is. Advances the two-sample window.
    pub fn released(&mut self) -> bool {
        self.update();
        self.previously_pressed && !self.currently_pressed
    }

    /// Counts clicks repeated within the rolling click budget.
    ///
    /// Returns 0 if no click starts the sequence. Blocks for at least one
    /// full budget after the last click.
    pub fn consecutive_clicks(&mut self) -> u32 {
        if !self.clicked() {
            return 0;
        }

        let mut times_clicked = 1;
        let mut last_click = self.clock.now();

        while self.clock.now() < last_click + self.click_budget {
            if !self.clicked() {
                continue;
            }
            times_clicked += 1;
            last_click = self.clock.now();
        }

        times_clicked
    }

    /// Blocks until the button is released and returns how long it was held.
    /// Returns zero if it is not currently pressed.
    pub fn hold_time(&mut self) -> Duration {
        if !self.pressed() {
            return Duration::ZERO;
        }

        let hold_start = self.clock.now();
        while self.pressed() {}
        self.clock.now().saturating_duration_since(hold_start)
    }

    /// Waits for a click for at most `timeout` (forever if `None`).
    pub fn wait_for_click(&mut self, timeout: Option<Duration>) -> bool {
        self.wait_until(Self::clicked, timeout)
    }

    /// Waits for a press for at most `timeout` (forever if `None`).
    pub fn wait_for_press(&mut self, timeout: Option<Duration>) -> bool {
        self.wait_until(Self::pressed, timeout)
    }

    /// Waits for a release for at most `timeout` (forever if `None`).
    pub fn wait_for_release(&mut self, timeout: Option<Duration>) -> bool {
        self.wait_until(Self::released, timeout)
    }

    /// Waits for exactly `clicks` consecutive clicks for at most `timeout`.
    pub fn wait_for_consecutive_clicks(&mut self, clicks: u32, timeout: Option<Duration>) -> bool {
        self.wait_until(|button| button.consecutive_clicks() == clicks, timeout)
    }

    /// Waits for a hold lasting between `min_time` and `max_time` for at
    /// most `timeout`.
    pub fn wait_for_hold(
        &mut self,
        min_time: Option<Duration>,
        max_time: Option<Duration>,
        timeout: Option<Duration>,
    ) -> bool {
        let min_time = min_time.unwrap_or(Duration::ZERO);
        let max_time = max_time.unwrap_or(Duration::from_secs(1_000_000));
        self.wait_until(
            |button| {
                let held = button.hold_time();
                min_time < held && held < max_time
            },
            timeout,
        )
    }

    fn wait_until<F>(&mut self, mut condition: F, timeout: Option<Duration>) -> bool
    where
        F: FnMut(&mut Self) -> bool,
    {
        let start = self.clock.now();
        loop {
            if condition(self) {
                return true;
            }
            if let Some(timeout) = timeout {
                if self.clock.now() > start + timeout {
                    return false;
                }
            }
        }
    }
}

/// Scripted press source for tests.
///
/// Replays a fixed sequence of samples, then holds the final value. Can
/// advance a shared [`ManualClock`] on every poll so blocking helpers
/// terminate deterministically.
pub struct MemorySource {
    samples: std::collections::VecDeque<bool>,
    idle: bool,
    auto_advance: Option<(Arc<ManualClock>, Duration)>,
}

impl MemorySource {
    /// Creates a source replaying `samples`, reading `false` afterwards.
    pub fn new<I: IntoIterator<Item = bool>>(samples: I) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            idle: false,
            auto_advance: None,
        }
    }

    /// Advances `clock` by `step` on every poll.
    #[must_use]
    pub fn advancing(mut self, clock: Arc<ManualClock>, step: Duration) -> Self {
        self.auto_advance = Some((clock, step));
        self
    }
}

impl PressSource for MemorySource {
    fn pressed(&mut self) -> bool {
        if let Some((clock, step)) = &self.auto_advance {
            clock.advance(*step);
        }
        match self.samples.pop_front() {
            Some(sample) => {
                self.idle = sample;
                sample
            }
            None => self.idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clicked_is_a_rising_edge() {
        let source = MemorySource::new([false, true, true, false]);
        let mut button = DebouncedButton::new(source);

        assert!(!button.clicked()); // false
        assert!(button.clicked()); // false -> true
        assert!(!button.clicked()); // true -> true
        assert!(button.released()); // true -> false
    }

    #[test]
    fn hold_time_measures_until_release() {
        let clock = Arc::new(ManualClock::new());
        let step = Duration::from_millis(10);
        // pressed for 3 polls after the initial read, then released
        let source =
            MemorySource::new([true, true, true, true, false]).advancing(clock.clone(), step);
        let mut button = DebouncedButton::with_clock(source, clock);

        let held = button.hold_time();
        assert!(held >= Duration::from_millis(30));
    }

    #[test]
    fn hold_time_is_zero_when_not_pressed() {
        let mut button = DebouncedButton::new(MemorySource::new([false]));
        assert_eq!(button.hold_time(), Duration::ZERO);
    }

    #[test]
    fn wait_for_press_times_out() {
        let clock = Arc::new(ManualClock::new());
        let source =
            MemorySource::new([false]).advancing(clock.clone(), Duration::from_millis(50));
        let mut button = DebouncedButton::with_clock(source, clock);

        assert!(!button.wait_for_press(Some(Duration::from_millis(200))));
    }

    #[test]
    fn consecutive_clicks_counts_within_budget() {
        let clock = Arc::new(ManualClock::new());
        let step = Duration::from_millis(100);
        // Each `clicked` costs one poll. Script: click, release, click, then
        // silence until the budget lapses.
        let source = MemorySource::new([false, true, false, true, false])
            .advancing(clock.clone(), step);
        let mut button = DebouncedButton::with_clock(source, clock)
            .with_click_budget(Duration::from_millis(500));

        // prime the window so the first scripted rising edge is observed
        assert!(!button.clicked());
        assert_eq!(button.consecutive_clicks(), 2);
    }
}
