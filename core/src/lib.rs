//! Framesync Core - real-time synchronization for emulator frontends
//!
//! Keeps a fixed-rate emulation tick, a variable-rate display refresh and a
//! hardware-clocked audio callback consistent with each other.
//!
//! # Architecture
//!
//! - [`RingBuffer`] - Lock-free single-producer/single-consumer sample ring
//! - [`AudioOutput`] - Per-channel rings fed by the tick, drained by the host
//! - [`FramePacer`] - Fixed-rate tick source with drift correction
//! - [`VisibilityCoordinator`] - Pauses audio and pacing while hidden
//! - [`SyncSession`] - Owns all of the above for one emulation session

pub mod audio;
pub mod config;
pub mod pacer;
pub mod session;
#[cfg(test)]
pub mod test_utils;
pub mod visibility;

pub use audio::{
    AudioError, AudioHost, AudioOutput, AudioPull, AudioSettings, AudioStream, CpalHost,
    OutputState, RingBuffer,
};
pub use config::{Config, ConfigError, VideoStandard};
pub use pacer::{Clock, FramePacer, PacerReport, PacerState, SyncMode, SystemClock, TickScheduler, Wake};
pub use session::{Emulator, FrameSink, SyncSession, drive_frame};
pub use visibility::VisibilityCoordinator;
