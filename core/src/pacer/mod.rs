//! Frame pacing against wall-clock time
//!
//! [`FramePacer`] fires the emulation tick at a fixed target frequency on top
//! of host scheduling primitives that are neither precise nor guaranteed to
//! run (a hidden window may not be refreshed for seconds).
//!
//! Each tick advances a deadline by one frame period. If the host falls more
//! than [`FramePacer::tolerance`] behind that deadline, or a resync was
//! requested, the deadline is re-anchored to "now" instead of running a burst
//! of catch-up ticks.
//!
//! The pacer never blocks. It asks a [`TickScheduler`] to wake it again and
//! the host reports back through [`FramePacer::wake`].

use std::time::{Duration, Instant};

use tracing::{debug, info};

mod clock;
mod stats;


pub use clock::{Clock, SystemClock};
pub use stats::PacerReport;

use stats::TickWindow;

/// Number of seconds of lag tolerated before the deadline is re-anchored
const RESYNC_TOLERANCE_SECS: u32 = 2;

/// Length of the statistics window, in seconds of ticks
const DEBUG_WINDOW_SECS: u32 = 10;

/// Host scheduling primitives the pacer re-arms itself with.
pub trait TickScheduler {
    /// Wake the pacer with [`Wake::Refresh`] on the next display refresh.
    fn next_refresh(&mut self);

    /// Wake the pacer with [`Wake::Timer`] once `delay` has elapsed. A zero
    /// delay still yields to the host before firing.
    fn after(&mut self, delay: Duration);
}

/// Which host primitive woke the pacer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Timer,
    Refresh,
}

/// How ticks are released once their deadline is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Release on the next display refresh
    Display,
    /// Release from the timer alone
    Timer,
}

/// Externally visible pacer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    Idle,
    Running,
    Paused,
}

/// Which wake the pacer is currently waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Armed {
    None,
    /// Waiting out the remaining frame time
    Timeout,
    /// Waiting for a display refresh
    Refresh,
    /// Zero-delay timer yield (timer-paced mode)
    Yield,
}

/// Self-rescheduling fixed-rate tick source.
pub struct FramePacer<C: Clock = SystemClock> {
    clock: C,
    /// Target tick rate in Hz
    frequency: u32,
    frame_period: Duration,
    tolerance: Duration,
    sync_mode: SyncMode,
    /// Log a report at the end of every statistics window
    debug: bool,

    started: bool,
    paused: bool,
    armed: Armed,

    /// Deadline for the next tick
    next_timestamp: Instant,
    /// Re-anchor on the next tick regardless of lag
    force_resync: bool,
    resyncs: u64,

    window: TickWindow,
    last_report: Option<PacerReport>,
}

impl FramePacer<SystemClock> {
    /// Create a pacer on the system clock
    pub fn new(frequency: u32, sync_mode: SyncMode, debug: bool) -> Self {
        Self::with_clock(SystemClock, frequency, sync_mode, debug)
    }
}

impl<C: Clock> FramePacer<C> {
    /// Create a pacer on a specific clock
    ///
    /// # Panics
    ///
    /// Panics if `frequency` is zero.
    pub fn with_clock(clock: C, frequency: u32, sync_mode: SyncMode, debug: bool) -> Self {
        assert!(frequency > 0, "pacer frequency must be non-zero");

        let frame_period = Duration::from_secs_f64(1.0 / frequency as f64);
        // period * frequency * 2: a two second grace window
        let tolerance = frame_period * frequency * RESYNC_TOLERANCE_SECS;
        let now = clock.now();

        Self {
            clock,
            frequency,
            frame_period,
            tolerance,
            sync_mode,
            debug,
            started: false,
            paused: false,
            armed: Armed::None,
            next_timestamp: now,
            force_resync: false,
            resyncs: 0,
            window: TickWindow::new(now),
            last_report: None,
        }
    }

    /// Anchor the first deadline one frame from now and arm the scheduler.
    ///
    /// Only the first call has any effect.
    pub fn start(&mut self, scheduler: &mut dyn TickScheduler) {
        if self.started {
            return;
        }
        self.started = true;

        let now = self.clock.now();
        info!(
            "Frame period: {:?}, frequency: {} Hz, sync: {:?}",
            self.frame_period, self.frequency, self.sync_mode
        );
        self.next_timestamp = now + self.frame_period;
        self.window.reset(now);
        self.armed = Armed::Timeout;
        scheduler.after(self.frame_period);
    }

    /// Handle a wake from the host.
    ///
    /// Runs `tick` if this wake releases a frame, then re-arms the scheduler.
    /// Wakes the pacer is not waiting for are ignored. Returns whether `tick`
    /// ran.
    pub fn wake<F: FnOnce()>(
        &mut self,
        wake: Wake,
        scheduler: &mut dyn TickScheduler,
        tick: F,
    ) -> bool {
        match (self.armed, wake) {
            (Armed::Timeout, Wake::Timer) => {
                if self.sync_mode == SyncMode::Display {
                    // Frame time has elapsed; release on the next refresh
                    self.armed = Armed::Refresh;
                    scheduler.next_refresh();
                    return false;
                }
            }
            (Armed::Yield, Wake::Timer) | (Armed::Refresh, Wake::Refresh) => {}
            _ => return false,
        }
        self.armed = Armed::None;

        if self.paused {
            // Poll at frame rate until resumed
            self.armed = Armed::Timeout;
            scheduler.after(self.frame_period);
            return false;
        }

        tick();
        self.next_timestamp += self.frame_period;

        let now = self.clock.now();
        if now > self.next_timestamp + self.tolerance || self.force_resync {
            self.resync(now);
        }

        let wait_ms = signed_millis(self.next_timestamp, now);
        self.window.record(wait_ms);

        match self.next_timestamp.checked_duration_since(now) {
            Some(wait) if !wait.is_zero() => {
                self.armed = Armed::Timeout;
                scheduler.after(wait);
            }
            _ => self.yield_to_host(scheduler),
        }

        if self.window.ticks >= u64::from(self.frequency * DEBUG_WINDOW_SECS) {
            self.close_window();
        }
        true
    }

    /// Stop (or resume) releasing ticks. Repeating the current state is a no-op.
    ///
    /// The deadline is left alone; after a long pause the lag check on the
    /// next tick re-anchors it.
    pub fn pause(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        debug!("Frame pacer {}", if paused { "paused" } else { "resumed" });
    }

    /// Re-anchor timing on the next tick
    pub fn request_resync(&mut self) {
        self.force_resync = true;
    }

    pub fn resync_pending(&self) -> bool {
        self.force_resync
    }

    pub fn state(&self) -> PacerState {
        if !self.started {
            PacerState::Idle
        } else if self.paused {
            PacerState::Paused
        } else {
            PacerState::Running
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Target tick rate in Hz
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// Lag beyond which the deadline is re-anchored
    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Deadline for the next tick
    pub fn next_timestamp(&self) -> Instant {
        self.next_timestamp
    }

    /// Number of times timing has been re-anchored
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Ticks recorded in the current statistics window
    pub fn window_ticks(&self) -> u64 {
        self.window.ticks
    }

    /// Report from the most recently closed statistics window
    pub fn last_report(&self) -> Option<PacerReport> {
        self.last_report
    }

    fn resync(&mut self, now: Instant) {
        self.force_resync = false;
        self.next_timestamp = now;
        self.window.reset(now);
        self.resyncs += 1;
        info!("Adjusted next timestamp");
    }

    /// Hand control back to the host without a timeout
    fn yield_to_host(&mut self, scheduler: &mut dyn TickScheduler) {
        match self.sync_mode {
            SyncMode::Display => {
                self.armed = Armed::Refresh;
                scheduler.next_refresh();
            }
            SyncMode::Timer => {
                self.armed = Armed::Yield;
                scheduler.after(Duration::ZERO);
            }
        }
    }

    fn close_window(&mut self) {
        let now = self.clock.now();
        let report = self
            .window
            .report(now, self.frequency, self.sync_mode == SyncMode::Timer);
        if self.debug {
            match report.avg_wait_scaled {
                Some(wait) => debug!(
                    "v: {:.2} Hz, vsync: 0, wait: {:.2}",
                    report.effective_hz, wait
                ),
                None => debug!("v: {:.2} Hz, vsync: 1", report.effective_hz),
            }
        }
        self.last_report = Some(report);
        self.window.reset(now);
    }
}

/// `deadline - now` in milliseconds, negative when the deadline has passed
fn signed_millis(deadline: Instant, now: Instant) -> f64 {
    if deadline >= now {
        (deadline - now).as_secs_f64() * 1000.0
    } else {
        -((now - deadline).as_secs_f64() * 1000.0)
    }
}
