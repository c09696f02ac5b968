//! Audio pull counters shared between the tick path and the host callback

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the pull side, readable from anywhere.
#[derive(Debug, Default)]
pub struct AudioStats {
    pulls: AtomicU64,
    underruns: AtomicU64,
    padded_frames: AtomicU64,
}

/// Point-in-time copy of [`AudioStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStatsSnapshot {
    /// Pull callbacks served (paused pulls included)
    pub pulls: u64,
    /// Pulls that had to pad with silence
    pub underruns: u64,
    /// Total frames of silence emitted to cover underruns
    pub padded_frames: u64,
}

impl AudioStats {
    pub(super) fn record_pull(&self, padded: usize) {
        self.pulls.fetch_add(1, Ordering::Relaxed);
        if padded > 0 {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            self.padded_frames
                .fetch_add(padded as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> AudioStatsSnapshot {
        AudioStatsSnapshot {
            pulls: self.pulls.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            padded_frames: self.padded_frames.load(Ordering::Relaxed),
        }
    }
}
