//! Rolling tick statistics for the pacer debug window

use std::time::Instant;

/// Summary of one statistics window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacerReport {
    /// Observed tick rate over the window, in Hz
    pub effective_hz: f64,
    /// Average wait per tick scaled to the target frequency, in ms per
    /// second. Only meaningful in timer-paced mode.
    pub avg_wait_scaled: Option<f64>,
}

/// Accumulates ticks and waits since the window opened.
#[derive(Debug, Clone, Copy)]
pub(super) struct TickWindow {
    pub start: Instant,
    pub ticks: u64,
    /// Sum of signed waits in milliseconds
    pub total_wait_ms: f64,
}

impl TickWindow {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            ticks: 0,
            total_wait_ms: 0.0,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    pub fn record(&mut self, wait_ms: f64) {
        self.ticks += 1;
        self.total_wait_ms += wait_ms;
    }

    pub fn report(&self, now: Instant, frequency: u32, timer_paced: bool) -> PacerReport {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let ticks = self.ticks.max(1) as f64;
        let effective_hz = if elapsed > 0.0 { ticks / elapsed } else { 0.0 };
        let avg_wait_scaled =
            timer_paced.then(|| (self.total_wait_ms / ticks) * frequency as f64);
        PacerReport {
            effective_hz,
            avg_wait_scaled,
        }
    }
}
