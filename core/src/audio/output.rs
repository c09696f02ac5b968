//! Per-channel audio output bridging the emulation tick to the host clock

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::host::{AudioError, AudioHost, AudioStream};
use super::ring::{Consumer, Producer, RingBuffer};
use super::stats::{AudioStats, AudioStatsSnapshot};
use crate::config::AudioConfig;

/// Shape of an audio session, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    /// Number of channels (one ring each)
    pub channels: usize,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Ring capacity per channel, in samples
    pub buffer_capacity: usize,
    /// Frames the host requests per pull
    pub callback_quantum: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48_000,
            buffer_capacity: 16_384,
            callback_quantum: 512,
        }
    }
}

impl From<&AudioConfig> for AudioSettings {
    fn from(config: &AudioConfig) -> Self {
        Self {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_capacity: config.buffer_size,
            callback_quantum: config.callback_quantum,
        }
    }
}

impl AudioSettings {
    fn validate(&self) -> Result<(), AudioError> {
        if self.channels == 0 {
            return Err(AudioError::InvalidSettings("channel count is zero".into()));
        }
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidSettings("sample rate is zero".into()));
        }
        if self.buffer_capacity == 0 {
            return Err(AudioError::InvalidSettings("buffer capacity is zero".into()));
        }
        if self.callback_quantum == 0 {
            return Err(AudioError::InvalidSettings("callback quantum is zero".into()));
        }
        Ok(())
    }
}

/// Lifecycle of the host connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Configured, no host callback registered yet
    Detached,
    /// Pull callback registered with the host
    Attached,
    /// Host audio unavailable; pushes are accepted and discarded
    Disabled,
}

/// Producer-side audio output.
///
/// Owns one ring per channel. The tick path pushes into it; the matching
/// [`AudioPull`] is moved into the host callback on [`attach`](Self::attach).
pub struct AudioOutput {
    settings: AudioSettings,
    producers: Vec<Producer<f32>>,
    /// Pull side, held until handed to the host
    pull: Option<AudioPull>,
    stream: Option<Box<dyn AudioStream>>,
    state: OutputState,
    paused: bool,
    /// Mirror of `paused` visible to the callback context
    pause_flag: Arc<AtomicBool>,
    stats: Arc<AudioStats>,
}

impl AudioOutput {
    /// Configure an output: one ring of `buffer_capacity` samples per channel.
    pub fn new(settings: AudioSettings) -> Result<Self, AudioError> {
        settings.validate()?;

        let pause_flag = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(AudioStats::default());

        let (producers, consumers): (Vec<_>, Vec<_>) = (0..settings.channels)
            .map(|_| RingBuffer::<f32>::new(settings.buffer_capacity).split())
            .unzip();

        let pull = AudioPull {
            blocks: vec![vec![0.0; settings.callback_quantum]; settings.channels],
            consumers,
            paused: pause_flag.clone(),
            stats: stats.clone(),
        };

        Ok(Self {
            settings,
            producers,
            pull: Some(pull),
            stream: None,
            state: OutputState::Detached,
            paused: false,
            pause_flag,
            stats,
        })
    }

    /// Register the pull callback with `host`.
    ///
    /// No-op once attached (or disabled). If the host cannot provide audio the
    /// output becomes [`OutputState::Disabled`] instead of failing.
    pub fn attach(&mut self, host: &mut dyn AudioHost) {
        if self.state != OutputState::Detached {
            return;
        }
        let Some(pull) = self.pull.take() else {
            return;
        };

        match host.open(&self.settings, pull) {
            Ok(mut stream) => {
                let host_rate = stream.sample_rate();
                if host_rate != self.settings.sample_rate {
                    debug!(
                        "Host runs at {} Hz instead of requested {} Hz",
                        host_rate, self.settings.sample_rate
                    );
                    self.settings.sample_rate = host_rate;
                }
                if !self.paused
                    && let Err(e) = stream.resume()
                {
                    warn!("Failed to start audio stream: {}", e);
                }
                self.stream = Some(stream);
                self.state = OutputState::Attached;
                info!(
                    "Audio attached: {} Hz, {} channels, quantum {}",
                    self.settings.sample_rate, self.settings.channels, self.settings.callback_quantum
                );
            }
            Err(e) => {
                warn!("Failed to open audio output: {}. Audio disabled.", e);
                self.state = OutputState::Disabled;
            }
        }
    }

    /// Queue `length` samples from each channel slice.
    ///
    /// # Panics
    ///
    /// Panics if the number of slices differs from the configured channel
    /// count, or if any slice holds fewer than `length` samples.
    pub fn push(&mut self, channels: &[&[f32]], length: usize) {
        assert_eq!(
            channels.len(),
            self.producers.len(),
            "push expects one slice per configured channel"
        );
        for (index, slice) in channels.iter().enumerate() {
            assert!(
                slice.len() >= length,
                "channel {} has {} samples, push asked for {}",
                index,
                slice.len(),
                length
            );
        }

        if self.state == OutputState::Disabled {
            return;
        }
        for (producer, slice) in self.producers.iter_mut().zip(channels) {
            producer.push(&slice[..length]);
        }
    }

    /// Suspend or resume the host clock. Repeating the current state is a no-op.
    pub fn pause(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        self.pause_flag.store(paused, Ordering::Release);

        if let Some(stream) = &mut self.stream {
            let result = if paused {
                stream.suspend()
            } else {
                stream.resume()
            };
            if let Err(e) = result {
                warn!("Audio pause({}) failed: {}", paused, e);
            }
        }
        debug!("Audio output {}", if paused { "paused" } else { "resumed" });
    }

    /// Re-issue a resume if the host reports its clock stopped while we are
    /// not paused. Hosts that gate audio behind user interaction need this on
    /// every input event until the clock is running.
    pub fn ensure_running(&mut self) {
        if self.paused {
            return;
        }
        if let Some(stream) = &mut self.stream
            && !stream.is_running()
            && let Err(e) = stream.resume()
        {
            debug!("Audio resume attempt failed: {}", e);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Effective sample rate (host rate once attached)
    pub fn frequency(&self) -> u32 {
        self.settings.sample_rate
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    /// Samples waiting in the first channel's ring
    pub fn buffered(&self) -> usize {
        self.producers.first().map_or(0, |p| p.ring().len())
    }

    pub fn stats(&self) -> AudioStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Consumer-side audio output, driven by the host clock.
///
/// Moved into the host callback. Pre-allocates one block per channel so a
/// pull at the configured quantum does not allocate.
pub struct AudioPull {
    consumers: Vec<Consumer<f32>>,
    blocks: Vec<Vec<f32>>,
    paused: Arc<AtomicBool>,
    stats: Arc<AudioStats>,
}

impl AudioPull {
    /// Make room for pulls of up to `frames` without allocating.
    ///
    /// Call before the pull is moved into the callback.
    pub fn reserve(&mut self, frames: usize) {
        for block in &mut self.blocks {
            block.reserve(frames.saturating_sub(block.len()));
        }
    }

    #[cfg(test)]
    pub(crate) fn block_capacity(&self) -> usize {
        self.blocks.iter().map(Vec::capacity).min().unwrap_or(0)
    }

    /// Produce one fully populated block of `frames` samples per channel.
    ///
    /// Buffered samples come first; the rest is silence. While paused every
    /// block is silent and nothing is consumed.
    pub fn pull(&mut self, frames: usize) -> &[Vec<f32>] {
        for block in &mut self.blocks {
            block.resize(frames, 0.0);
        }

        if self.paused.load(Ordering::Acquire) {
            for block in &mut self.blocks {
                block.fill(0.0);
            }
            self.stats.record_pull(0);
            return &self.blocks;
        }

        let mut padded = 0;
        for (consumer, block) in self.consumers.iter_mut().zip(&mut self.blocks) {
            let copied = consumer.pop_into(block);
            padded = padded.max(frames - copied);
        }
        self.stats.record_pull(padded);
        &self.blocks
    }

    /// Fill an interleaved buffer with `out_channels` channels per frame.
    ///
    /// Device channels beyond the configured count are silent; a trailing
    /// partial frame is zeroed.
    pub fn pull_interleaved(&mut self, out: &mut [f32], out_channels: usize) {
        if out_channels == 0 {
            out.fill(0.0);
            return;
        }
        let frames = out.len() / out_channels;
        self.pull(frames);

        let channels = self.blocks.len();
        for (frame, chunk) in out.chunks_exact_mut(out_channels).enumerate() {
            for (channel, sample) in chunk.iter_mut().enumerate() {
                *sample = if channel < channels {
                    self.blocks[channel][frame]
                } else {
                    0.0
                };
            }
        }
        out[frames * out_channels..].fill(0.0);
    }
}
