//! Framesync Player - native host for the frame pacer and audio output
//!
//! Runs a built-in test pattern through a [`SyncSession`] so pacing and
//! audio buffering can be observed without an emulator core.
//!
//! # Usage
//!
//! ```bash
//! framesync-player
//! framesync-player --pal --no-vsync
//! framesync-player --config my-config.toml --debug
//! ```
//!
//! # Keyboard Shortcuts
//!
//! - ESC: Quit
//! - Any key or click: resume audio if the host suspended it

mod app;
mod pattern;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use framesync_core::{SyncSession, VideoStandard, config};

use crate::app::{PlayerConfig, run};

#[derive(Parser)]
#[command(name = "framesync-player")]
#[command(author, version, about = "Framesync - paced emulator frontend test player")]
struct Args {
    /// Config file to use instead of the platform default
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Time ticks for PAL (50 Hz) content
    #[arg(long)]
    pal: bool,

    /// Release ticks from the timer instead of display refresh
    #[arg(long)]
    no_vsync: bool,

    /// Verbose logging and pacer statistics
    #[arg(long, short = 'd')]
    debug: bool,

    /// Requested audio sample rate in Hz
    #[arg(long, value_name = "HZ")]
    sample_rate: Option<u32>,

    /// Run without opening an audio device
    #[arg(long)]
    mute: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.config
        && !path.exists()
    {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::load(),
    };

    if args.pal {
        config.video.standard = VideoStandard::Pal;
    }
    if args.no_vsync {
        config.video.vsync = false;
    }
    if args.debug {
        config.debug.pacer_stats = true;
    }
    if let Some(rate) = args.sample_rate {
        config.audio.sample_rate = rate;
    }
    config.validate()?;

    info!(
        "Framesync player: {:?} at {} Hz, vsync {}",
        config.video.standard,
        config.frequency(),
        config.video.vsync
    );

    let session = SyncSession::new(&config)?;
    run(PlayerConfig {
        session,
        mute: args.mute,
    })
}
