//! Per-session ownership of audio output, frame pacer and visibility routing
//!
//! A [`SyncSession`] is built once per emulation session and handed to the
//! host's driver loop by reference. Each released tick runs one emulation step,
//! presents its frame and queues its audio.

use smallvec::SmallVec;
use tracing::info;

use crate::audio::{AudioError, AudioHost, AudioOutput, AudioSettings};
use crate::config::Config;
use crate::pacer::{Clock, FramePacer, SyncMode, SystemClock, TickScheduler, Wake};
use crate::visibility::VisibilityCoordinator;

/// The emulated machine, as seen by the driver loop.
pub trait Emulator {
    /// Run one emulated frame. Returns the number of audio samples produced
    /// per channel.
    fn step(&mut self) -> usize;

    /// Pixels of the most recent frame
    fn frame_buffer(&self) -> &[u8];

    /// Samples of the most recent frame for `channel`, at least as long as
    /// the count returned by [`step`](Self::step)
    fn audio_channel(&self, channel: usize) -> &[f32];
}

/// Destination for finished frames.
pub trait FrameSink {
    fn present(&mut self, pixels: &[u8]);
}

/// Run one emulation step and route its output.
pub fn drive_frame<E, S>(emulator: &mut E, sink: &mut S, audio: &mut AudioOutput)
where
    E: Emulator + ?Sized,
    S: FrameSink + ?Sized,
{
    let samples = emulator.step();
    sink.present(emulator.frame_buffer());

    let channels: SmallVec<[&[f32]; 2]> = (0..audio.settings().channels)
        .map(|channel| emulator.audio_channel(channel))
        .collect();
    audio.push(&channels, samples);
}

/// Everything one emulation session needs to stay in sync.
pub struct SyncSession<C: Clock = SystemClock> {
    audio: AudioOutput,
    pacer: FramePacer<C>,
    visibility: VisibilityCoordinator,
}

impl SyncSession<SystemClock> {
    /// Build a session from configuration on the system clock
    pub fn new(config: &Config) -> Result<Self, AudioError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SyncSession<C> {
    pub fn with_clock(config: &Config, clock: C) -> Result<Self, AudioError> {
        let audio = AudioOutput::new(AudioSettings::from(&config.audio))?;
        let sync_mode = if config.video.vsync {
            SyncMode::Display
        } else {
            SyncMode::Timer
        };
        let pacer = FramePacer::with_clock(
            clock,
            config.frequency(),
            sync_mode,
            config.debug.pacer_stats,
        );

        Ok(Self {
            audio,
            pacer,
            visibility: VisibilityCoordinator::new(),
        })
    }

    /// Register audio with the host; degrades to silent output on failure
    pub fn attach_audio(&mut self, host: &mut dyn AudioHost) {
        self.audio.attach(host);
    }

    /// Start pacing ticks
    pub fn start(&mut self, scheduler: &mut dyn TickScheduler) {
        info!(
            "Session starting: {} Hz video, {} Hz audio",
            self.pacer.frequency(),
            self.audio.frequency()
        );
        self.pacer.start(scheduler);
    }

    /// Deliver a host wake; runs one frame if the pacer releases a tick.
    pub fn wake<E, S>(
        &mut self,
        wake: Wake,
        scheduler: &mut dyn TickScheduler,
        emulator: &mut E,
        sink: &mut S,
    ) -> bool
    where
        E: Emulator + ?Sized,
        S: FrameSink + ?Sized,
    {
        let audio = &mut self.audio;
        self.pacer
            .wake(wake, scheduler, || drive_frame(emulator, sink, audio))
    }

    /// Forward the host's visibility signal
    pub fn set_hidden(&mut self, hidden: bool) {
        self.visibility
            .set_hidden(hidden, &mut self.audio, &mut self.pacer);
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility.is_hidden()
    }

    pub fn audio(&self) -> &AudioOutput {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioOutput {
        &mut self.audio
    }

    pub fn pacer(&self) -> &FramePacer<C> {
        &self.pacer
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::VideoStandard;
    use crate::pacer::PacerState;
    use crate::test_utils::{FakeAudioHost, ManualClock, RecordingScheduler, Scheduled};

    /// Emits a ramp of `samples` values per frame on both channels
    struct RampEmulator {
        frames: u32,
        samples: usize,
        pixels: Vec<u8>,
        left: Vec<f32>,
        right: Vec<f32>,
    }

    impl RampEmulator {
        fn new(samples: usize) -> Self {
            Self {
                frames: 0,
                samples,
                pixels: vec![0; 4],
                left: vec![0.0; samples],
                right: vec![0.0; samples],
            }
        }
    }

    impl Emulator for RampEmulator {
        fn step(&mut self) -> usize {
            self.frames += 1;
            self.pixels.fill(self.frames as u8);
            for i in 0..self.samples {
                let value = (self.frames as usize * 100 + i) as f32;
                self.left[i] = value;
                self.right[i] = -value;
            }
            self.samples
        }

        fn frame_buffer(&self) -> &[u8] {
            &self.pixels
        }

        fn audio_channel(&self, channel: usize) -> &[f32] {
            if channel == 0 { &self.left } else { &self.right }
        }
    }

    #[derive(Default)]
    struct CountingSink {
        presented: Vec<u8>,
    }

    impl FrameSink for CountingSink {
        fn present(&mut self, pixels: &[u8]) {
            self.presented.push(pixels[0]);
        }
    }

    fn config(vsync: bool) -> Config {
        let mut config = Config::default();
        config.video.standard = VideoStandard::Pal;
        config.video.vsync = vsync;
        config.audio.buffer_size = 64;
        config.audio.callback_quantum = 8;
        config
    }

    #[test]
    fn test_session_from_config() {
        let session = SyncSession::with_clock(&config(true), ManualClock::new()).unwrap();
        assert_eq!(session.pacer().frequency(), 50);
        assert_eq!(session.pacer().sync_mode(), SyncMode::Display);
        assert_eq!(session.audio().frequency(), 48_000);
        assert_eq!(session.pacer().state(), PacerState::Idle);
        assert!(!session.is_hidden());
    }

    #[test]
    fn test_invalid_audio_config_is_an_error() {
        let mut bad = config(true);
        bad.audio.channels = 0;
        assert!(SyncSession::with_clock(&bad, ManualClock::new()).is_err());
    }

    #[test]
    fn test_tick_runs_frame_and_queues_audio() {
        let clock = ManualClock::new();
        let mut session = SyncSession::with_clock(&config(false), clock.clone()).unwrap();
        let mut host = FakeAudioHost::new();
        let mut scheduler = RecordingScheduler::default();
        let mut emulator = RampEmulator::new(3);
        let mut sink = CountingSink::default();

        session.attach_audio(&mut host);
        session.start(&mut scheduler);
        assert_eq!(scheduler.last(), Some(Scheduled::After(Duration::from_millis(20))));

        clock.advance(Duration::from_millis(20));
        assert!(session.wake(Wake::Timer, &mut scheduler, &mut emulator, &mut sink));
        clock.advance(Duration::from_millis(20));
        assert!(session.wake(Wake::Timer, &mut scheduler, &mut emulator, &mut sink));

        assert_eq!(sink.presented, vec![1, 2]);
        assert_eq!(session.audio().buffered(), 6);

        let blocks = host.pull(8);
        assert_eq!(&blocks[0][..6], &[100.0, 101.0, 102.0, 200.0, 201.0, 202.0]);
        assert_eq!(&blocks[1][..6], &[-100.0, -101.0, -102.0, -200.0, -201.0, -202.0]);
        assert_eq!(&blocks[0][6..], &[0.0, 0.0]);
    }

    #[test]
    fn test_hidden_session_skips_frames_and_resyncs_on_return() {
        let clock = ManualClock::new();
        let mut session = SyncSession::with_clock(&config(false), clock.clone()).unwrap();
        let mut host = FakeAudioHost::new();
        let mut scheduler = RecordingScheduler::default();
        let mut emulator = RampEmulator::new(1);
        let mut sink = CountingSink::default();

        session.attach_audio(&mut host);
        session.start(&mut scheduler);

        session.set_hidden(true);
        assert!(session.audio().is_paused());
        clock.advance(Duration::from_millis(20));
        assert!(!session.wake(Wake::Timer, &mut scheduler, &mut emulator, &mut sink));
        assert!(sink.presented.is_empty());

        session.set_hidden(false);
        clock.advance(Duration::from_millis(20));
        assert!(session.wake(Wake::Timer, &mut scheduler, &mut emulator, &mut sink));
        assert_eq!(session.pacer().resyncs(), 1);
        assert!(!session.pacer().resync_pending());
        assert_eq!(sink.presented, vec![1]);
    }

    #[test]
    fn test_disabled_audio_still_runs_frames() {
        let clock = ManualClock::new();
        let mut session = SyncSession::with_clock(&config(false), clock.clone()).unwrap();
        let mut scheduler = RecordingScheduler::default();
        let mut emulator = RampEmulator::new(4);
        let mut sink = CountingSink::default();

        session.attach_audio(&mut FakeAudioHost::unavailable());
        session.start(&mut scheduler);
        clock.advance(Duration::from_millis(20));
        assert!(session.wake(Wake::Timer, &mut scheduler, &mut emulator, &mut sink));
        assert_eq!(sink.presented, vec![1]);
        assert_eq!(session.audio().buffered(), 0);
    }
}
