//! Fixed-rate tick timer for the main loop.
//!
//! The scheduling logic itself never sleeps; it is handed an `Instant`
//! per tick. This module owns the one place real time enters the loop: a
//! fixed-rate deadline sequence with catch-up skipping, so a data fetch
//! that stalls one tick for several seconds is followed by the next
//! deadline in the future, not by a burst of make-up ticks.

use std::thread;
use std::time::{Duration, Instant};

/// Fixed-rate ticker with missed-slot skipping.
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    /// A ticker whose first deadline is one period after `now`.
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    /// Compute the deadline to sleep until, given the current time, and
    /// advance the schedule past it. Deadlines already missed (a slow
    /// fetch overran the slot) are skipped rather than replayed.
    pub fn next_deadline(&mut self, now: Instant) -> Instant {
        if self.next <= now {
            self.next = now + self.period;
        }
        let deadline = self.next;
        self.next += self.period;
        deadline
    }

    /// Block until the next tick deadline.
    pub fn wait(&mut self) {
        let now = Instant::now();
        let deadline = self.next_deadline(now);
        thread::sleep(deadline.saturating_duration_since(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn deadlines_advance_at_the_fixed_rate() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(SEC, t0);

        assert_eq!(ticker.next_deadline(t0), t0 + SEC);
        assert_eq!(ticker.next_deadline(t0 + SEC), t0 + 2 * SEC);
        assert_eq!(ticker.next_deadline(t0 + 2 * SEC), t0 + 3 * SEC);
    }

    #[test]
    fn missed_slots_are_skipped_not_replayed() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(SEC, t0);
        ticker.next_deadline(t0);

        // A fetch stalled the loop for 5 s: the next deadline is in the
        // future, not four catch-up ticks in the past.
        let late = t0 + Duration::from_secs(5) + Duration::from_millis(300);
        let deadline = ticker.next_deadline(late);
        assert_eq!(deadline, late + SEC);

        // And the cadence resumes from there
        assert_eq!(ticker.next_deadline(deadline), late + 2 * SEC);
    }

    #[test]
    fn on_time_ticks_do_not_drift() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(SEC, t0);

        // Waking slightly late within the slot keeps the original grid
        let mut now = t0;
        for i in 1..=10u32 {
            let deadline = ticker.next_deadline(now);
            assert_eq!(deadline, t0 + i * SEC);
            now = deadline + Duration::from_millis(50);
        }
    }
}
