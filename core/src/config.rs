//! Configuration management (config.toml)
//!
//! Handles loading and providing defaults for frontend settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from reading or writing configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Frontend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Video timing settings
    #[serde(default)]
    pub video: VideoConfig,
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Debug settings
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Television standard the emulated content is timed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    /// 60 Hz
    #[default]
    Ntsc,
    /// 50 Hz
    Pal,
}

impl VideoStandard {
    /// Tick frequency in Hz
    pub fn frequency(self) -> u32 {
        match self {
            Self::Ntsc => 60,
            Self::Pal => 50,
        }
    }
}

/// Video timing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Content timing standard (default: ntsc)
    #[serde(default)]
    pub standard: VideoStandard,
    /// Release ticks on display refresh instead of the timer (default: true)
    #[serde(default = "default_true")]
    pub vsync: bool,
}

/// Audio output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Requested sample rate in Hz (default: 48000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Output channels (default: 2)
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Ring buffer size per channel in samples (default: 16384)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Frames per host audio callback (default: 512)
    #[serde(default = "default_callback_quantum")]
    pub callback_quantum: usize,
}

/// Debug configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    /// Log pacer statistics every window (default: false)
    #[serde(default)]
    pub pacer_stats: bool,
}

fn default_true() -> bool {
    true
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_channels() -> usize {
    2
}
fn default_buffer_size() -> usize {
    16_384
}
fn default_callback_quantum() -> usize {
    512
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            standard: VideoStandard::default(),
            vsync: default_true(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            buffer_size: default_buffer_size(),
            callback_quantum: default_callback_quantum(),
        }
    }
}

impl Config {
    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if audio.channels == 0 {
            return Err(ConfigError::Invalid("audio.channels must be at least 1".into()));
        }
        if audio.sample_rate == 0 {
            return Err(ConfigError::Invalid("audio.sample_rate must be non-zero".into()));
        }
        if audio.callback_quantum == 0 {
            return Err(ConfigError::Invalid(
                "audio.callback_quantum must be non-zero".into(),
            ));
        }
        if audio.buffer_size < audio.callback_quantum * 2 {
            return Err(ConfigError::Invalid(format!(
                "audio.buffer_size ({}) must hold at least two callbacks ({})",
                audio.buffer_size,
                audio.callback_quantum * 2
            )));
        }
        Ok(())
    }

    /// Tick frequency implied by the video standard
    pub fn frequency(&self) -> u32 {
        self.video.standard.frequency()
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.framesync", "", "Framesync")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `config.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    config_dir()
        .and_then(|dir| load_from(&dir.join("config.toml")).ok())
        .unwrap_or_default()
}

/// Loads the configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
