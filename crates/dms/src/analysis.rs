//! DMS analysis results and alerts

use serde::{Deserialize, Serialize};
use crate::detector::DrowsinessEvent;
use crate::eye::EyeContour;

/// DMS alert types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmsAlert {
    /// Eyes closed long enough to count as drowsy
    Drowsiness,

    /// Face not visible (camera blocked?)
    FaceNotVisible,
}

/// Per-frame eye measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EyeMeasurement {
    /// Left eye contour in pixel space
    pub left: EyeContour,
    /// Right eye contour in pixel space
    pub right: EyeContour,
    /// Left eye aspect ratio
    pub left_openness: f32,
    /// Right eye aspect ratio
    pub right_openness: f32,
    /// Mean of both eyes
    pub aggregate_openness: f32,
}

/// Complete DMS analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Eye measurement (if a face was detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eyes: Option<EyeMeasurement>,

    /// Drowsiness edge produced by this frame
    pub event: DrowsinessEvent,

    /// Whether a drowsy episode is in progress after this frame
    pub drowsy: bool,

    /// Consecutive closed-eye frames so far
    pub closed_frames: u32,

    /// Active alerts
    pub alerts: Vec<DmsAlert>,
}

impl Default for DmsAnalysis {
    fn default() -> Self {
        Self {
            face_detected: false,
            eyes: None,
            event: DrowsinessEvent::NoChange,
            drowsy: false,
            closed_frames: 0,
            alerts: Vec::new(),
        }
    }
}

impl DmsAnalysis {
    /// Check if any alerts are active
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    /// Get highest severity alert
    pub fn highest_severity_alert(&self) -> Option<DmsAlert> {
        if self.alerts.contains(&DmsAlert::Drowsiness) {
            Some(DmsAlert::Drowsiness)
        } else {
            self.alerts.first().copied()
        }
    }
}
