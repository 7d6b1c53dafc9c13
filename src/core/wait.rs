//! Suspension primitives for routine bodies.
//!
//! A routine cedes control by returning [`StepOutcome::Pending`]; these types
//! decide *when* to stop doing that. [`SyncDelay`] is the one-shot form,
//! [`PeriodicDelay`] the recurring form that compensates for missed periods.
//!
//! Both guarantee at least one `Pending` per traversal, even for a zero
//! duration, so a routine polling them always yields the tick at least once
//! and can never monopolize the loop.

use std::time::{Duration, Instant};

use crate::core::task::StepOutcome;

/// A restartable "wait until time T" state machine.
///
/// Poll it once per step; while it returns [`StepOutcome::Pending`], return
/// `Pending` from the routine as well. [`SyncDelay::rearm`] makes the same
/// value reusable for the next wait.
#[derive(Debug, Clone)]
pub struct SyncDelay {
    duration: Duration,
    unlock_at: Instant,
    polled: bool,
}

impl SyncDelay {
    /// Creates a delay unlocking `duration` after `now`.
    pub fn new(now: Instant, duration: Duration) -> Self {
        Self {
            duration,
            unlock_at: now + duration,
            polled: false,
        }
    }

    /// Advances the wait by one suspension point.
    ///
    /// Returns `Pending` while the unlock time has not passed, and at least
    /// once regardless; `Complete` afterwards (and on every later poll until
    /// re-armed).
    pub fn poll(&mut self, now: Instant) -> StepOutcome {
        if now < self.unlock_at || !self.polled {
            self.polled = true;
            return StepOutcome::Pending;
        }
        StepOutcome::Complete
    }

    /// Restarts the wait: unlock moves to `now` plus the original duration.
    pub fn rearm(&mut self, now: Instant) {
        self.unlock_at = now + self.duration;
        self.polled = false;
    }

    /// The instant this delay unlocks.
    pub fn unlock_at(&self) -> Instant {
        self.unlock_at
    }
}

/// Recurring delay that preserves long-run periodicity.
///
/// After each completed wait the next unlock time advances by whole multiples
/// of the period past the overrun, so a slow traversal shifts *which* period
/// fires next but never accumulates drift.
#[derive(Debug, Clone)]
pub struct PeriodicDelay {
    period: Duration,
    unlock_at: Instant,
    polled: bool,
}

impl PeriodicDelay {
    /// Creates a periodic delay first unlocking `period` after `now`.
    pub fn new(now: Instant, period: Duration) -> Self {
        Self {
            period,
            unlock_at: now + period,
            polled: false,
        }
    }

    /// Advances the wait by one suspension point.
    ///
    /// On completion the delay re-arms itself for the next period boundary
    /// after `now`, skipping any periods that were missed entirely.
    pub fn poll(&mut self, now: Instant) -> StepOutcome {
        if now < self.unlock_at || !self.polled {
            self.polled = true;
            return StepOutcome::Pending;
        }

        self.polled = false;
        if self.period.is_zero() {
            self.unlock_at = now;
        } else {
            let overrun = now.saturating_duration_since(self.unlock_at);
            let missed = overrun.as_nanos() / self.period.as_nanos();
            let advance = u32::try_from(missed + 1).unwrap_or(u32::MAX);
            self.unlock_at += self.period.saturating_mul(advance);
        }
        StepOutcome::Complete
    }

    /// The instant the current period unlocks.
    pub fn unlock_at(&self) -> Instant {
        self.unlock_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_still_yields_once() {
        let now = Instant::now();
        let mut delay = SyncDelay::new(now, Duration::ZERO);

        assert_eq!(delay.poll(now), StepOutcome::Pending);
        assert_eq!(delay.poll(now), StepOutcome::Complete);
    }

    #[test]
    fn delay_pends_until_unlock() {
        let now = Instant::now();
        let mut delay = SyncDelay::new(now, Duration::from_secs(3));

        assert_eq!(delay.poll(now), StepOutcome::Pending);
        assert_eq!(delay.poll(now + Duration::from_secs(2)), StepOutcome::Pending);
        assert_eq!(delay.poll(now + Duration::from_secs(3)), StepOutcome::Complete);
    }

    #[test]
    fn rearm_makes_delay_reusable() {
        let now = Instant::now();
        let mut delay = SyncDelay::new(now, Duration::from_secs(1));

        assert_eq!(delay.poll(now), StepOutcome::Pending);
        let later = now + Duration::from_secs(2);
        assert_eq!(delay.poll(later), StepOutcome::Complete);

        delay.rearm(later);
        assert_eq!(delay.poll(later), StepOutcome::Pending);
        assert_eq!(delay.poll(later + Duration::from_secs(1)), StepOutcome::Complete);
    }

    #[test]
    fn periodic_delay_compensates_for_missed_periods() {
        let now = Instant::now();
        let period = Duration::from_secs(10);
        let mut delay = PeriodicDelay::new(now, period);

        assert_eq!(delay.poll(now), StepOutcome::Pending);

        // Overrun by 2.5 periods: the next unlock lands on the following
        // whole boundary (t = 40s), not 10s after the late completion.
        let late = now + Duration::from_secs(35);
        assert_eq!(delay.poll(late), StepOutcome::Complete);
        assert_eq!(delay.unlock_at(), now + Duration::from_secs(40));
    }

    #[test]
    fn zero_period_rearms_without_panicking() {
        let now = Instant::now();
        let mut delay = PeriodicDelay::new(now, Duration::ZERO);

        assert_eq!(delay.poll(now), StepOutcome::Pending);
        assert_eq!(delay.poll(now), StepOutcome::Complete);
        assert_eq!(delay.poll(now), StepOutcome::Pending);
    }
}
