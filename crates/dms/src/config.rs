//! DMS configuration

use camera_capture::FALLBACK_FPS;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What a frame without face landmarks does to the closed-eye count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFacePolicy {
    /// Count the frame as neutral openness: the counter resets and an
    /// active drowsy episode ends
    #[default]
    Reset,
    /// Leave the counter and drowsy flag untouched
    Pause,
}

/// Named threshold/duration presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    #[default]
    Standard,
    /// Earlier alarm
    Strict,
    /// Later alarm
    Lenient,
}

impl FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!(
                "unknown sensitivity {:?} (expected standard, strict or lenient)",
                other
            )),
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Aggregate eye aspect ratio below which eyes count as closed
    pub ear_threshold: f32,

    /// Sustained closure before drowsiness is declared (seconds)
    pub closed_eyes_seconds: f64,

    /// Frame rate used when the source reports none
    pub fallback_fps: f64,

    /// Handling of frames without landmarks
    pub missing_face_policy: MissingFacePolicy,

    /// Consecutive frames without a face before raising `FaceNotVisible`
    /// (0 disables the alert)
    pub face_absent_alert_frames: u32,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            closed_eyes_seconds: 2.0,
            fallback_fps: FALLBACK_FPS,
            missing_face_policy: MissingFacePolicy::Reset,
            face_absent_alert_frames: 30,
        }
    }
}

impl DmsConfig {
    /// Create strict config (earlier alarm)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.28,
            closed_eyes_seconds: 1.5,
            ..Default::default()
        }
    }

    /// Create lenient config (later alarm)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.21,
            closed_eyes_seconds: 3.0,
            ..Default::default()
        }
    }

    /// Preset for `sensitivity`
    pub fn for_sensitivity(sensitivity: Sensitivity) -> Self {
        match sensitivity {
            Sensitivity::Standard => Self::default(),
            Sensitivity::Strict => Self::strict(),
            Sensitivity::Lenient => Self::lenient(),
        }
    }

    /// Take threshold and duration from a preset, keeping everything else
    pub fn apply_sensitivity(&mut self, sensitivity: Sensitivity) {
        let preset = Self::for_sensitivity(sensitivity);
        self.ear_threshold = preset.ear_threshold;
        self.closed_eyes_seconds = preset.closed_eyes_seconds;
    }
}
