//! Host audio subsystem abstraction and the cpal implementation
//!
//! The host owns the real-time clock: once a stream is opened, it invokes the
//! [`AudioPull`] it was handed at the callback quantum until suspended.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tracing::{debug, error};

use super::output::{AudioPull, AudioSettings};

/// Upper bound on the callback size pre-allocated for when the device does not
/// accept a fixed buffer size
const MAX_CALLBACK_FRAMES: usize = 8192;

/// Errors from configuring or opening audio output
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    /// Settings rejected before any host call
    #[error("invalid audio settings: {0}")]
    InvalidSettings(String),

    /// Host has no output device
    #[error("no audio output device available")]
    NoDevice,

    /// Device configuration query failed
    #[error("failed to query output config: {0}")]
    Config(String),

    /// Device only offers a sample format we cannot write
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Stream could not be built
    #[error("failed to build audio stream: {0}")]
    Build(String),

    /// Stream could not be started or stopped
    #[error("failed to control audio stream: {0}")]
    Control(String),
}

/// A running (or suspended) host audio clock.
pub trait AudioStream {
    /// Sample rate the host actually runs at
    fn sample_rate(&self) -> u32;

    /// Start or restart the clock
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Stop the clock; the pull callback stops firing
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Whether the host reports the clock as running
    fn is_running(&self) -> bool;
}

/// Something that can register a pull callback with a real-time audio clock.
pub trait AudioHost {
    /// Register `pull` with the host. The returned stream starts suspended.
    fn open(
        &mut self,
        settings: &AudioSettings,
        pull: AudioPull,
    ) -> Result<Box<dyn AudioStream>, AudioError>;
}

/// Audio host backed by the platform default cpal output device.
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for CpalHost {
    fn open(
        &mut self,
        settings: &AudioSettings,
        pull: AudioPull,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        let device = self
            .host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        // Prefer the requested rate and channel count; otherwise take whatever
        // the device defaults to and let the output adopt its rate.
        let requested = cpal::SampleRate(settings.sample_rate);
        let matching = device.supported_output_configs().ok().and_then(|mut configs| {
            configs.find(|c| {
                c.channels() as usize == settings.channels
                    && c.min_sample_rate() <= requested
                    && requested <= c.max_sample_rate()
            })
        });
        let supported = match matching {
            Some(range) => range.with_sample_rate(requested),
            None => device
                .default_output_config()
                .map_err(|e| AudioError::Config(e.to_string()))?,
        };

        let mut config: cpal::StreamConfig = supported.config();
        let quantum = settings.callback_quantum;
        let max_frames = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => {
                if (*min as usize..=*max as usize).contains(&quantum) {
                    config.buffer_size = cpal::BufferSize::Fixed(quantum as u32);
                    quantum
                } else {
                    (*max as usize).min(MAX_CALLBACK_FRAMES).max(quantum)
                }
            }
            cpal::SupportedBufferSize::Unknown => MAX_CALLBACK_FRAMES.max(quantum),
        };

        let sample_rate = config.sample_rate.0;
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, max_frames, pull)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, max_frames, pull)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, max_frames, pull)?,
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        };

        debug!(
            "Audio stream opened: {} Hz, {} device channels, buffer {:?}",
            sample_rate, config.channels, config.buffer_size
        );

        Ok(Box::new(CpalStream {
            stream,
            sample_rate,
            running: false,
        }))
    }
}

fn build_stream<S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    max_frames: usize,
    mut pull: AudioPull,
) -> Result<cpal::Stream, AudioError>
where
    S: SizedSample + FromSample<f32>,
{
    let device_channels = config.channels as usize;
    // Sized for the largest callback the device advertises; only grows if the
    // host exceeds it
    pull.reserve(max_frames);
    let mut scratch: Vec<f32> = vec![0.0; max_frames * device_channels];

    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let block = &mut scratch[..data.len()];
                pull.pull_interleaved(block, device_channels);
                for (out, &sample) in data.iter_mut().zip(block.iter()) {
                    *out = S::from_sample(sample);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Build(e.to_string()))
}

struct CpalStream {
    stream: cpal::Stream,
    sample_rate: u32,
    running: bool,
}

impl AudioStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::Control(e.to_string()))?;
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::Control(e.to_string()))?;
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
