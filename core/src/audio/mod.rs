//! Audio output for the emulation frontend
//!
//! Architecture:
//! - Each emulated frame, the tick path pushes one slice per channel into
//!   [`AudioOutput`], which writes them into per-channel [`RingBuffer`]s
//! - The host audio clock drains the rings through [`AudioPull`] at its own
//!   callback quantum, padding with silence on underrun
//! - The rings are the only state shared between the two contexts
//!
//! Defaults:
//! - 48,000 Hz requested sample rate (the host rate wins if it differs)
//! - Stereo, 16,384 samples of ring per channel
//! - 512 frames per host pull

mod host;
mod output;
mod ring;
mod stats;


pub use host::{AudioError, AudioHost, AudioStream, CpalHost};
pub use output::{AudioOutput, AudioPull, AudioSettings, OutputState};
pub use ring::{Consumer, Producer, RingBuffer, Sample};
pub use stats::AudioStatsSnapshot;
