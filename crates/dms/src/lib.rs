//! Driver Monitoring System (DMS)
//!
//! Real-time drowsiness analysis from facial landmarks:
//! - Eye contour extraction from a face landmark set
//! - Eye aspect ratio (openness) per eye and per frame
//! - Frame-rate-aware debouncing of sustained eye closure

pub mod analysis;
pub mod config;
pub mod detector;
pub mod eye;
pub mod landmarks;
pub mod state;

pub use analysis::{DmsAlert, DmsAnalysis, EyeMeasurement};
pub use config::{DmsConfig, MissingFacePolicy, Sensitivity};
pub use detector::{required_consecutive_frames, DrowsinessDetector, DrowsinessEvent};
pub use eye::{aggregate_openness, estimate_openness, EyeContour, EyePoint};
pub use landmarks::{FaceLandmarks, LandmarkProvider, TraceLandmarkProvider};
pub use state::{DetectorState, DriverState};

use camera_capture::frame::VideoFrame;
use thiserror::Error;
use tracing::warn;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Landmark detection failed: {0}")]
    Landmarks(String),

    #[error("Landmark trace error: {0}")]
    Trace(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Driver monitoring module: one per monitored driver session
pub struct DmsModule {
    config: DmsConfig,
    landmarks: Box<dyn LandmarkProvider>,
    detector: DrowsinessDetector,
    state: DriverState,
}

impl DmsModule {
    /// Create a module for a source running at `fps` (None if unknown)
    pub fn new(
        config: DmsConfig,
        landmarks: Box<dyn LandmarkProvider>,
        fps: Option<f64>,
    ) -> Result<Self, DmsError> {
        if !(config.ear_threshold.is_finite() && config.ear_threshold > 0.0) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be positive, got {}",
                config.ear_threshold
            )));
        }
        Ok(Self {
            detector: DrowsinessDetector::from_config(&config, fps),
            landmarks,
            state: DriverState::default(),
            config,
        })
    }

    /// Analyze a single frame for driver state
    pub fn analyze(&mut self, frame: &VideoFrame) -> Result<DmsAnalysis, DmsError> {
        self.state.frames_analyzed += 1;

        let Some(face) = self.landmarks.detect(frame)? else {
            return Ok(self.face_missing());
        };
        self.state.face_absent_frames = 0;

        let (left, right) = face.eye_contours(frame.width, frame.height)?;
        let left_openness = left.aspect_ratio();
        let right_openness = right.aspect_ratio();
        let aggregate = aggregate_openness(left_openness, right_openness);

        let event = self.detector.observe(aggregate);
        if event == DrowsinessEvent::EnteredDrowsy {
            self.state.drowsy_episodes += 1;
        }

        Ok(DmsAnalysis {
            face_detected: true,
            eyes: Some(EyeMeasurement {
                left,
                right,
                left_openness,
                right_openness,
                aggregate_openness: aggregate,
            }),
            alerts: self.alerts(),
            ..self.snapshot(event)
        })
    }

    fn face_missing(&mut self) -> DmsAnalysis {
        self.state.face_absent_frames = self.state.face_absent_frames.saturating_add(1);
        if self.state.face_absent_frames == self.config.face_absent_alert_frames {
            warn!("No face visible for {} frames", self.state.face_absent_frames);
        }
        let event = self.detector.observe_missing(self.config.missing_face_policy);

        DmsAnalysis {
            alerts: self.alerts(),
            ..self.snapshot(event)
        }
    }

    fn snapshot(&self, event: DrowsinessEvent) -> DmsAnalysis {
        let state = self.detector.state();
        DmsAnalysis {
            event,
            drowsy: state.is_drowsy,
            closed_frames: state.consecutive_closed_frames,
            ..Default::default()
        }
    }

    fn alerts(&self) -> Vec<DmsAlert> {
        let mut alerts = Vec::new();
        if self.detector.is_drowsy() {
            alerts.push(DmsAlert::Drowsiness);
        }
        let limit = self.config.face_absent_alert_frames;
        if limit > 0 && self.state.face_absent_frames >= limit {
            alerts.push(DmsAlert::FaceNotVisible);
        }
        alerts
    }

    /// Consecutive closed frames required before drowsiness
    pub fn required_frames(&self) -> u32 {
        self.detector.required_frames()
    }

    pub fn is_drowsy(&self) -> bool {
        self.detector.is_drowsy()
    }

    pub fn driver_state(&self) -> &DriverState {
        &self.state
    }

    /// Reset driver state (on driver change)
    pub fn reset_state(&mut self) {
        self.state.reset();
        self.detector.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Eye landmarks whose aspect ratio is `ear` in a 100x100 frame
    fn eyes_with_ear(ear: f32) -> FaceLandmarks {
        let gap = 0.2 * ear / 2.0;
        let eye = |x0: f32| {
            [
                (x0, 0.5),
                (x0 + 0.066, 0.5 - gap),
                (x0 + 0.133, 0.5 - gap),
                (x0 + 0.2, 0.5),
                (x0 + 0.133, 0.5 + gap),
                (x0 + 0.066, 0.5 + gap),
            ]
        };
        FaceLandmarks::eyes_only(eye(0.1), eye(0.6))
    }

    struct Scripted(VecDeque<Option<FaceLandmarks>>);

    impl LandmarkProvider for Scripted {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
            Ok(self.0.pop_front().flatten())
        }
    }

    fn module(script: Vec<Option<FaceLandmarks>>, config: DmsConfig, fps: Option<f64>) -> DmsModule {
        DmsModule::new(config, Box::new(Scripted(script.into())), fps).unwrap()
    }

    fn frame() -> VideoFrame {
        VideoFrame::solid(100, 100, [0, 0, 0], 0, 0)
    }

    #[test]
    fn test_measures_both_eyes() {
        let mut dms = module(vec![Some(eyes_with_ear(0.3))], DmsConfig::default(), Some(30.0));
        let analysis = dms.analyze(&frame()).unwrap();
        let eyes = analysis.eyes.as_ref().unwrap();
        assert!((eyes.left_openness - 0.3).abs() < 1e-3);
        assert!((eyes.aggregate_openness - 0.3).abs() < 1e-3);
        assert_eq!(analysis.event, DrowsinessEvent::NoChange);
        assert!(!analysis.has_alerts());
    }

    #[test]
    fn test_drowsiness_alert_after_required_frames() {
        let script = vec![Some(eyes_with_ear(0.1)); 3];
        let mut dms = module(script, DmsConfig::default(), Some(1.0));
        assert_eq!(dms.required_frames(), 2);

        assert_eq!(dms.analyze(&frame()).unwrap().event, DrowsinessEvent::NoChange);
        let analysis = dms.analyze(&frame()).unwrap();
        assert_eq!(analysis.event, DrowsinessEvent::EnteredDrowsy);
        assert_eq!(analysis.highest_severity_alert(), Some(DmsAlert::Drowsiness));

        let analysis = dms.analyze(&frame()).unwrap();
        assert_eq!(analysis.event, DrowsinessEvent::NoChange);
        assert!(analysis.drowsy);
        assert_eq!(dms.driver_state().drowsy_episodes, 1);
    }

    #[test]
    fn test_missing_face_resets_by_default() {
        let script = vec![Some(eyes_with_ear(0.1)), Some(eyes_with_ear(0.1)), None];
        let mut dms = module(script, DmsConfig::default(), Some(1.0));
        dms.analyze(&frame()).unwrap();
        assert!(dms.analyze(&frame()).unwrap().drowsy);

        let analysis = dms.analyze(&frame()).unwrap();
        assert!(!analysis.face_detected);
        assert_eq!(analysis.event, DrowsinessEvent::ExitedDrowsy);
        assert_eq!(analysis.closed_frames, 0);
    }

    #[test]
    fn test_missing_face_pause_policy() {
        let config = DmsConfig {
            missing_face_policy: MissingFacePolicy::Pause,
            ..Default::default()
        };
        let script = vec![Some(eyes_with_ear(0.1)), None, Some(eyes_with_ear(0.1))];
        let mut dms = module(script, config, Some(1.0));
        dms.analyze(&frame()).unwrap();
        assert_eq!(dms.analyze(&frame()).unwrap().closed_frames, 1);
        assert_eq!(dms.analyze(&frame()).unwrap().event, DrowsinessEvent::EnteredDrowsy);
    }

    #[test]
    fn test_face_not_visible_alert() {
        let config = DmsConfig {
            face_absent_alert_frames: 2,
            ..Default::default()
        };
        let mut dms = module(vec![None, None, Some(eyes_with_ear(0.3))], config, None);
        assert!(!dms.analyze(&frame()).unwrap().has_alerts());
        assert_eq!(
            dms.analyze(&frame()).unwrap().alerts,
            vec![DmsAlert::FaceNotVisible]
        );
        assert!(!dms.analyze(&frame()).unwrap().has_alerts());
    }

    #[test]
    fn test_zero_face_absent_frames_disables_alert() {
        let config = DmsConfig {
            face_absent_alert_frames: 0,
            ..Default::default()
        };
        let mut dms = module(vec![Some(eyes_with_ear(0.3)), None, None], config, None);
        for _ in 0..3 {
            let analysis = dms.analyze(&frame()).unwrap();
            assert!(!analysis.alerts.contains(&DmsAlert::FaceNotVisible));
        }
    }

    #[test]
    fn test_out_of_range_landmarks_skip_frame() {
        let far = [(1e9, 0.5); 6];
        let mut dms = module(
            vec![Some(FaceLandmarks::eyes_only(far, far)), Some(eyes_with_ear(0.3))],
            DmsConfig::default(),
            None,
        );
        assert!(matches!(dms.analyze(&frame()), Err(DmsError::InvalidInput(_))));
        assert!(dms.analyze(&frame()).unwrap().face_detected);
    }

    #[test]
    fn test_malformed_landmarks_are_invalid_input() {
        let bad = FaceLandmarks::face_mesh(vec![(0.5, 0.5); 10]);
        let mut dms = module(vec![Some(bad)], DmsConfig::default(), None);
        assert!(matches!(dms.analyze(&frame()), Err(DmsError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let config = DmsConfig {
            ear_threshold: 0.0,
            ..Default::default()
        };
        let result = DmsModule::new(config, Box::new(Scripted(VecDeque::new())), None);
        assert!(matches!(result, Err(DmsError::Config(_))));
    }

    #[test]
    fn test_reset_state() {
        let mut dms = module(vec![Some(eyes_with_ear(0.1)); 2], DmsConfig::default(), Some(1.0));
        dms.analyze(&frame()).unwrap();
        dms.analyze(&frame()).unwrap();
        assert!(dms.is_drowsy());
        dms.reset_state();
        assert!(!dms.is_drowsy());
        assert_eq!(dms.driver_state().frames_analyzed, 0);
    }
}
