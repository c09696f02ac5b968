//! Shared test utilities for unit tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::audio::{AudioError, AudioHost, AudioPull, AudioSettings, AudioStream};
use crate::pacer::{Clock, TickScheduler};

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Instant `ms` milliseconds after the origin
    pub fn at(&self, ms: f64) -> Instant {
        self.origin + Duration::from_secs_f64(ms / 1000.0)
    }

    pub fn set_ms(&self, ms: f64) {
        self.offset.set(Duration::from_secs_f64(ms / 1000.0));
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// Compare instants to within a microsecond
pub fn assert_instant_near(actual: Instant, expected: Instant) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff < Duration::from_micros(1),
        "instants differ by {:?}",
        diff
    );
}

// ============================================================================
// Scheduler
// ============================================================================

/// A request made to the host scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scheduled {
    Refresh,
    After(Duration),
}

/// Scheduler that records requests instead of acting on them
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    pub calls: Vec<Scheduled>,
}

impl RecordingScheduler {
    pub fn last(&self) -> Option<Scheduled> {
        self.calls.last().copied()
    }
}

impl TickScheduler for RecordingScheduler {
    fn next_refresh(&mut self) {
        self.calls.push(Scheduled::Refresh);
    }

    fn after(&mut self, delay: Duration) {
        self.calls.push(Scheduled::After(delay));
    }
}

// ============================================================================
// Audio host
// ============================================================================

/// What the fake host observed
#[derive(Default)]
pub struct HostLog {
    pub opens: u32,
    pub resumes: u32,
    pub suspends: u32,
    pub running: bool,
    /// Pull side handed over on open, so tests can play the callback
    pub pull: Option<AudioPull>,
}

/// Audio host that records stream control calls
pub struct FakeAudioHost {
    pub log: Rc<RefCell<HostLog>>,
    /// Rate the fake stream reports; `None` echoes the requested rate
    pub sample_rate: Option<u32>,
    /// Fail every open as if no device existed
    pub unavailable: bool,
}

impl FakeAudioHost {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(HostLog::default())),
            sample_rate: None,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    /// Run one host callback of `frames` frames
    pub fn pull(&self, frames: usize) -> Vec<Vec<f32>> {
        let mut log = self.log.borrow_mut();
        let pull = log.pull.as_mut().expect("no stream opened");
        pull.pull(frames).to_vec()
    }
}

impl AudioHost for FakeAudioHost {
    fn open(
        &mut self,
        settings: &AudioSettings,
        pull: AudioPull,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        if self.unavailable {
            return Err(AudioError::NoDevice);
        }
        let mut log = self.log.borrow_mut();
        log.opens += 1;
        log.pull = Some(pull);
        Ok(Box::new(FakeStream {
            log: self.log.clone(),
            sample_rate: self.sample_rate.unwrap_or(settings.sample_rate),
        }))
    }
}

struct FakeStream {
    log: Rc<RefCell<HostLog>>,
    sample_rate: u32,
}

impl AudioStream for FakeStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut log = self.log.borrow_mut();
        log.resumes += 1;
        log.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        let mut log = self.log.borrow_mut();
        log.suspends += 1;
        log.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.log.borrow().running
    }
}
