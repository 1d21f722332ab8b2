//! Live monitor status shared with the status API

use dms::{DmsAlert, DmsAnalysis};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Most recent per-frame state
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatus {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub face_detected: bool,
    pub aggregate_openness: Option<f32>,
    pub closed_frames: u32,
    pub required_frames: u32,
    pub drowsy: bool,
    pub drowsy_episodes: u64,
    pub alerts: Vec<DmsAlert>,
    pub running: bool,
}

impl MonitorStatus {
    fn record(&mut self, analysis: &DmsAnalysis) {
        self.frames_processed += 1;
        self.face_detected = analysis.face_detected;
        self.aggregate_openness = analysis.eyes.as_ref().map(|e| e.aggregate_openness);
        self.closed_frames = analysis.closed_frames;
        self.drowsy = analysis.drowsy;
        self.alerts = analysis.alerts.clone();
        if analysis.event == dms::DrowsinessEvent::EnteredDrowsy {
            self.drowsy_episodes += 1;
        }
    }
}

/// Cheaply cloneable handle to the status
#[derive(Debug, Clone, Default)]
pub struct SharedStatus(Arc<RwLock<MonitorStatus>>);

impl SharedStatus {
    pub fn new(required_frames: u32) -> Self {
        Self(Arc::new(RwLock::new(MonitorStatus {
            required_frames,
            running: true,
            ..Default::default()
        })))
    }

    pub fn snapshot(&self) -> MonitorStatus {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn record(&self, analysis: &DmsAnalysis) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(analysis);
    }

    pub fn record_skipped(&self) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).frames_skipped += 1;
    }

    pub fn set_running(&self, running: bool) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).running = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::DrowsinessEvent;

    #[test]
    fn test_records_latest_frame() {
        let status = SharedStatus::new(60);
        status.record(&DmsAnalysis {
            face_detected: true,
            event: DrowsinessEvent::EnteredDrowsy,
            drowsy: true,
            closed_frames: 60,
            alerts: vec![DmsAlert::Drowsiness],
            ..Default::default()
        });
        status.record_skipped();

        let snapshot = status.snapshot();
        assert_eq!(snapshot.frames_processed, 1);
        assert_eq!(snapshot.frames_skipped, 1);
        assert_eq!(snapshot.required_frames, 60);
        assert_eq!(snapshot.drowsy_episodes, 1);
        assert!(snapshot.drowsy);
        assert!(snapshot.running);
    }
}
