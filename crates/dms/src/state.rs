//! Driver state tracking

use serde::{Deserialize, Serialize};

/// Debounce state of the drowsiness detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorState {
    /// Consecutive frames with eyes below the openness threshold
    pub consecutive_closed_frames: u32,
    /// Whether a drowsy episode is in progress
    pub is_drowsy: bool,
}

/// Driver state (tracked over time)
#[derive(Debug, Clone, Default)]
pub struct DriverState {
    /// Frames where face was not detected
    pub face_absent_frames: u32,

    /// Frames analyzed since the session started
    pub frames_analyzed: u64,

    /// Drowsy episodes entered since the session started
    pub drowsy_episodes: u32,
}

impl DriverState {
    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
