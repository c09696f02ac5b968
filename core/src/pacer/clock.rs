//! Wall-clock source for the pacer

use std::time::Instant;

/// Source of "now" for pacing decisions.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}
