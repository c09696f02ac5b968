//! Routes the host's surface visibility signal to audio and pacing

use tracing::debug;

use crate::audio::AudioOutput;
use crate::pacer::{Clock, FramePacer};

/// Pauses audio and pacing while the surface is hidden.
///
/// Every change of visibility, and every signal received while hidden, owes
/// the pacer a resync so it re-anchors timing instead of catching up on the
/// frames it missed.
#[derive(Debug, Default)]
pub struct VisibilityCoordinator {
    hidden: bool,
}

impl VisibilityCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward a visibility signal.
    pub fn set_hidden<C: Clock>(
        &mut self,
        hidden: bool,
        audio: &mut AudioOutput,
        pacer: &mut FramePacer<C>,
    ) {
        if hidden || hidden != self.hidden {
            pacer.request_resync();
        }
        if hidden != self.hidden {
            debug!("Surface {}", if hidden { "hidden" } else { "visible" });
        }
        self.hidden = hidden;

        audio.pause(hidden);
        pacer.pause(hidden);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}
