//! Consecutive-frame drowsiness debouncer

use camera_capture::FALLBACK_FPS;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DmsConfig, MissingFacePolicy};
use crate::state::DetectorState;

/// Default aggregate openness threshold
pub const DEFAULT_EAR_THRESHOLD: f32 = 0.25;

/// Outcome of observing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrowsinessEvent {
    NoChange,
    EnteredDrowsy,
    ExitedDrowsy,
}

/// Number of consecutive closed frames that make up `seconds` of video.
///
/// A missing, zero, negative or non-finite `fps` falls back to
/// `fallback_fps` (itself replaced by 30 if unusable). Never returns 0.
pub fn required_consecutive_frames(fps: Option<f64>, seconds: f64, fallback_fps: f64) -> u32 {
    let usable = |rate: f64| rate.is_finite() && rate > 0.0;
    let rate = match fps {
        Some(rate) if usable(rate) => rate,
        _ => {
            let fallback = if usable(fallback_fps) { fallback_fps } else { FALLBACK_FPS };
            warn!("Source frame rate {:?} unusable, assuming {} fps", fps, fallback);
            fallback
        }
    };
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    (rate * seconds).round().clamp(1.0, u32::MAX as f64) as u32
}

/// Converts per-frame openness into drowsy episode edges
#[derive(Debug, Clone)]
pub struct DrowsinessDetector {
    required_frames: u32,
    threshold: f32,
    state: DetectorState,
}

impl DrowsinessDetector {
    /// Create a detector requiring `required_frames` closed frames (at least 1)
    pub fn new(required_frames: u32, threshold: f32) -> Self {
        Self {
            required_frames: required_frames.max(1),
            threshold,
            state: DetectorState::default(),
        }
    }

    /// Create a detector for a source running at `fps`
    pub fn from_config(config: &DmsConfig, fps: Option<f64>) -> Self {
        let required =
            required_consecutive_frames(fps, config.closed_eyes_seconds, config.fallback_fps);
        info!(
            "FPS: {:?} | consecutive closed frames for {:.1} s: {}",
            fps, config.closed_eyes_seconds, required
        );
        Self::new(required, config.ear_threshold)
    }

    /// Observe one frame's aggregate openness against the configured threshold
    pub fn observe(&mut self, openness: f32) -> DrowsinessEvent {
        self.observe_with_threshold(openness, self.threshold)
    }

    /// Observe one frame's aggregate openness against `threshold`
    pub fn observe_with_threshold(&mut self, openness: f32, threshold: f32) -> DrowsinessEvent {
        if openness < threshold {
            self.state.consecutive_closed_frames =
                self.state.consecutive_closed_frames.saturating_add(1);

            if !self.state.is_drowsy && self.state.consecutive_closed_frames == self.required_frames
            {
                self.state.is_drowsy = true;
                info!(
                    "Eyes closed for {} consecutive frames, driver drowsy",
                    self.required_frames
                );
                return DrowsinessEvent::EnteredDrowsy;
            }
            DrowsinessEvent::NoChange
        } else {
            let was_drowsy = self.state.is_drowsy;
            self.state = DetectorState::default();
            if was_drowsy {
                info!("Eyes reopened (openness {:.3}), drowsy episode over", openness);
                DrowsinessEvent::ExitedDrowsy
            } else {
                DrowsinessEvent::NoChange
            }
        }
    }

    /// Account for a frame in which no face was found
    pub fn observe_missing(&mut self, policy: MissingFacePolicy) -> DrowsinessEvent {
        match policy {
            MissingFacePolicy::Reset => self.observe(self.threshold),
            MissingFacePolicy::Pause => {
                debug!("No landmarks, closed-frame count held at {}", self.state.consecutive_closed_frames);
                DrowsinessEvent::NoChange
            }
        }
    }

    /// Current debounce state
    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_drowsy(&self) -> bool {
        self.state.is_drowsy
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Forget any partial or ongoing episode
    pub fn reset(&mut self) {
        self.state = DetectorState::default();
    }
}
