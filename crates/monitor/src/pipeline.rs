//! Primary detection loop
//!
//! One frame at a time: capture → mirror → landmarks → openness →
//! debounce → alarm decision → annotate → present.

use alerting::{AlarmController, StartOutcome};
use camera_capture::{FrameSource, VideoFrame};
use dms::{DmsAnalysis, DmsModule, DrowsinessEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::overlay;
use crate::sink::{FrameSink, SinkControl};
use crate::status::SharedStatus;

/// Why the loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// The source has no more frames
    SourceExhausted,
    /// Reading a frame failed
    SourceFailed(String),
    /// Quit key, sink request or signal
    Quit,
}

/// Totals for one monitoring run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub skipped_frames: u64,
    pub drowsy_episodes: u64,
    pub alarm_failures: u64,
    pub end: EndReason,
}

/// Result of one loop iteration
#[derive(Debug)]
pub enum Step {
    Processed(DmsAnalysis),
    Skipped,
    Ended(EndReason),
}

/// Per-frame options
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    pub mirror: bool,
    pub annotate: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            annotate: true,
        }
    }
}

pub struct MonitorLoop {
    source: Box<dyn FrameSource>,
    dms: DmsModule,
    alarm: AlarmController,
    sink: Box<dyn FrameSink>,
    status: SharedStatus,
    options: LoopOptions,
    frames: u64,
    skipped: u64,
    episodes: u64,
    alarm_failures: u64,
}

impl MonitorLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        dms: DmsModule,
        alarm: AlarmController,
        sink: Box<dyn FrameSink>,
        status: SharedStatus,
        options: LoopOptions,
    ) -> Self {
        Self {
            source,
            dms,
            alarm,
            sink,
            status,
            options,
            frames: 0,
            skipped: 0,
            episodes: 0,
            alarm_failures: 0,
        }
    }

    /// Run until the source ends or `quit` is raised
    pub fn run(&mut self, quit: &AtomicBool) -> RunSummary {
        info!(
            "Monitoring started ({} closed frames to alarm)",
            self.dms.required_frames()
        );

        let end = loop {
            if quit.load(Ordering::SeqCst) {
                break EndReason::Quit;
            }
            if let Step::Ended(reason) = self.step() {
                break reason;
            }
        };

        self.status.set_running(false);
        let summary = self.summary(end);
        info!(
            "Monitoring ended ({:?}): {} frames, {} drowsy episodes",
            summary.end, summary.frames, summary.drowsy_episodes
        );
        summary
    }

    /// Read and fully process one frame
    pub fn step(&mut self) -> Step {
        let mut frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Frame source exhausted");
                return Step::Ended(EndReason::SourceExhausted);
            }
            Err(e) => {
                error!("Frame read failed, stopping: {}", e);
                return Step::Ended(EndReason::SourceFailed(e.to_string()));
            }
        };
        self.frames += 1;
        metrics::counter!("dms_frames_total").increment(1);

        if self.options.mirror {
            if let Err(e) = frame.mirror() {
                warn!("Frame {} not mirrored: {}", frame.sequence, e);
            }
        }

        let analysis = match self.dms.analyze(&frame) {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("Frame {} skipped: {}", frame.sequence, e);
                self.skipped += 1;
                self.status.record_skipped();
                metrics::counter!("dms_frames_skipped_total").increment(1);
                return Step::Skipped;
            }
        };

        self.apply_event(analysis.event);
        self.status.record(&analysis);
        record_metrics(&analysis);

        if let Some(control) = self.render(&mut frame, &analysis) {
            if control == SinkControl::Quit {
                return Step::Ended(EndReason::Quit);
            }
        }
        Step::Processed(analysis)
    }

    fn apply_event(&mut self, event: DrowsinessEvent) {
        match event {
            DrowsinessEvent::EnteredDrowsy => {
                self.episodes += 1;
                match self.alarm.start() {
                    Ok(StartOutcome::Started) => {
                        metrics::counter!("alarm_activations_total").increment(1);
                    }
                    Ok(StartOutcome::AlreadyActive) => debug!("Alarm was already sounding"),
                    Err(e) => {
                        self.alarm_failures += 1;
                        metrics::counter!("alarm_start_failures_total").increment(1);
                        warn!("Continuing without audible alarm: {}", e);
                    }
                }
            }
            DrowsinessEvent::ExitedDrowsy => self.alarm.stop(),
            DrowsinessEvent::NoChange => {}
        }
    }

    fn render(&mut self, frame: &mut VideoFrame, analysis: &DmsAnalysis) -> Option<SinkControl> {
        if self.options.annotate {
            if let Err(e) = overlay::annotate(frame, analysis) {
                warn!("Frame {} not annotated: {}", frame.sequence, e);
            }
        }
        match self.sink.present(frame) {
            Ok(control) => Some(control),
            Err(e) => {
                warn!("Frame {} not presented: {}", frame.sequence, e);
                None
            }
        }
    }

    fn summary(&self, end: EndReason) -> RunSummary {
        RunSummary {
            frames: self.frames,
            skipped_frames: self.skipped,
            drowsy_episodes: self.episodes,
            alarm_failures: self.alarm_failures,
            end,
        }
    }

    pub fn dms(&self) -> &DmsModule {
        &self.dms
    }
}

fn record_metrics(analysis: &DmsAnalysis) {
    metrics::gauge!("dms_drowsy").set(if analysis.drowsy { 1.0 } else { 0.0 });
    metrics::gauge!("dms_closed_frames").set(f64::from(analysis.closed_frames));
    if let Some(eyes) = &analysis.eyes {
        metrics::gauge!("dms_eye_openness").set(f64::from(eyes.aggregate_openness));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AudioError, AudioSink, ChannelRecognizer, VoiceCommandListener, VoiceConfig};
    use camera_capture::{BlankSource, CameraError};
    use dms::{DmsConfig, DmsError, FaceLandmarks, LandmarkProvider};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::runtime::Handle;

    /// Landmarks whose aggregate openness is `ear` in a 100x100 frame
    fn eyes_with_ear(ear: f32) -> FaceLandmarks {
        let gap = 0.2 * ear / 2.0;
        let eye = |x0: f32| {
            [
                (x0, 0.5),
                (x0 + 0.06, 0.5 - gap),
                (x0 + 0.14, 0.5 - gap),
                (x0 + 0.2, 0.5),
                (x0 + 0.14, 0.5 + gap),
                (x0 + 0.06, 0.5 + gap),
            ]
        };
        FaceLandmarks::eyes_only(eye(0.1), eye(0.6))
    }

    /// Openness chosen per frame sequence; mirroring does not change the ratio
    struct Script(Vec<Option<f32>>);

    impl LandmarkProvider for Script {
        fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
            Ok(self
                .0
                .get(frame.sequence as usize)
                .copied()
                .flatten()
                .map(eyes_with_ear))
        }
    }

    #[derive(Default)]
    struct Playback {
        playing: bool,
        plays: u32,
    }

    struct SharedSink(Arc<Mutex<Playback>>, bool);

    impl AudioSink for SharedSink {
        fn load(&mut self, _asset: &Path) -> Result<(), AudioError> {
            Ok(())
        }
        fn play(&mut self, _loop_forever: bool) -> Result<(), AudioError> {
            if self.1 {
                return Err(AudioError::Device("busy".into()));
            }
            let mut p = self.0.lock().unwrap();
            p.playing = true;
            p.plays += 1;
            Ok(())
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().playing = false;
        }
        fn is_playing(&self) -> bool {
            self.0.lock().unwrap().playing
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn nominal_fps(&self) -> Option<f64> {
            None
        }
        fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            Err(CameraError::Read("device unplugged".into()))
        }
    }

    struct QuitAfter(u32);

    impl FrameSink for QuitAfter {
        fn present(&mut self, frame: &VideoFrame) -> Result<SinkControl, crate::MonitorError> {
            Ok(if frame.sequence + 1 >= self.0 {
                SinkControl::Quit
            } else {
                SinkControl::Continue
            })
        }
    }

    struct Harness {
        monitor: MonitorLoop,
        alarm: AlarmController,
        playback: Arc<Mutex<Playback>>,
        status: SharedStatus,
    }

    fn harness(
        script: Vec<Option<f32>>,
        fps: Option<f64>,
        listener: Option<VoiceCommandListener>,
        failing_audio: bool,
    ) -> Harness {
        let frames = script.len() as u64;
        let source = BlankSource::new(100, 100, fps, Some(frames)).unwrap();
        let dms = DmsModule::new(DmsConfig::default(), Box::new(Script(script)), fps).unwrap();
        let playback = Arc::new(Mutex::new(Playback::default()));
        let alarm = AlarmController::new(
            Box::new(SharedSink(playback.clone(), failing_audio)),
            listener,
            true,
            Handle::current(),
        );
        let status = SharedStatus::new(dms.required_frames());
        let monitor = MonitorLoop::new(
            Box::new(source),
            dms,
            alarm.clone(),
            Box::new(crate::sink::NullSink),
            status.clone(),
            LoopOptions::default(),
        );
        Harness {
            monitor,
            alarm,
            playback,
            status,
        }
    }

    fn expect_processed(step: Step) -> DmsAnalysis {
        match step {
            Step::Processed(analysis) => analysis,
            other => panic!("expected a processed frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_alarm_follows_drowsy_episode_at_30_fps() {
        let mut script = vec![Some(0.10); 60];
        script.push(Some(0.40));
        let mut h = harness(script, Some(30.0), None, false);
        assert_eq!(h.monitor.dms().required_frames(), 60);

        for _ in 0..59 {
            let analysis = expect_processed(h.monitor.step());
            assert_eq!(analysis.event, DrowsinessEvent::NoChange);
        }
        assert!(!h.monitor.dms().is_drowsy());
        assert!(!h.alarm.is_running());

        let analysis = expect_processed(h.monitor.step());
        assert_eq!(analysis.event, DrowsinessEvent::EnteredDrowsy);
        assert!(h.monitor.dms().is_drowsy());
        assert!(h.alarm.is_running());
        assert!(h.playback.lock().unwrap().playing);

        let analysis = expect_processed(h.monitor.step());
        assert_eq!(analysis.event, DrowsinessEvent::ExitedDrowsy);
        assert_eq!(analysis.closed_frames, 0);
        assert!(!h.monitor.dms().is_drowsy());
        assert!(!h.alarm.is_running());
        assert!(!h.playback.lock().unwrap().playing);

        assert!(matches!(h.monitor.step(), Step::Ended(EndReason::SourceExhausted)));
    }

    #[tokio::test]
    async fn test_unknown_fps_falls_back_to_60_frames() {
        let h = harness(vec![], Some(0.0), None, false);
        assert_eq!(h.monitor.dms().required_frames(), 60);
        assert_eq!(h.status.snapshot().required_frames, 60);
    }

    #[tokio::test]
    async fn test_sustained_closure_plays_once() {
        let mut h = harness(vec![Some(0.05); 200], Some(30.0), None, false);
        let summary = h.monitor.run(&AtomicBool::new(false));

        assert_eq!(summary.frames, 200);
        assert_eq!(summary.drowsy_episodes, 1);
        assert_eq!(summary.end, EndReason::SourceExhausted);
        assert_eq!(h.playback.lock().unwrap().plays, 1);
        assert_eq!(h.alarm.stats().start_calls, 1);
        assert!(h.alarm.is_running());
        assert!(!h.status.snapshot().running);
    }

    #[tokio::test]
    async fn test_audio_failure_does_not_stop_detection() {
        let mut script = vec![Some(0.05); 60];
        script.extend([Some(0.4), Some(0.4)]);
        let mut h = harness(script, Some(30.0), None, true);
        let summary = h.monitor.run(&AtomicBool::new(false));

        assert_eq!(summary.frames, 62);
        assert_eq!(summary.alarm_failures, 1);
        assert_eq!(summary.drowsy_episodes, 1);
        assert!(!h.alarm.is_running());
        assert_eq!(h.status.snapshot().frames_processed, 62);
    }

    #[tokio::test]
    async fn test_missing_face_frames_reset_count() {
        let mut script = vec![Some(0.05); 59];
        script.push(None);
        script.extend(vec![Some(0.05); 59]);
        let mut h = harness(script, Some(30.0), None, false);
        let summary = h.monitor.run(&AtomicBool::new(false));

        assert_eq!(summary.drowsy_episodes, 0);
        assert!(!h.alarm.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_voice_stop_silences_alarm_mid_episode() {
        let (recognizer, tx) = ChannelRecognizer::new();
        let config = VoiceConfig {
            timeout_secs: 5.0,
            ..Default::default()
        };
        let listener = VoiceCommandListener::new(Arc::new(recognizer), config);
        let mut h = harness(vec![Some(0.05); 2], Some(0.5), Some(listener), false);
        assert_eq!(h.monitor.dms().required_frames(), 1);

        let analysis = expect_processed(h.monitor.step());
        assert_eq!(analysis.event, DrowsinessEvent::EnteredDrowsy);
        assert!(h.alarm.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("stop".to_string()).unwrap();
        h.alarm.take_listener().unwrap().await.unwrap();
        assert!(!h.alarm.is_running());

        // Still drowsy, but the episode does not re-arm the alarm
        let analysis = expect_processed(h.monitor.step());
        assert_eq!(analysis.event, DrowsinessEvent::NoChange);
        assert!(analysis.drowsy);
        assert!(!h.alarm.is_running());
        assert_eq!(h.playback.lock().unwrap().plays, 1);
    }

    #[tokio::test]
    async fn test_source_failure_ends_gracefully() {
        let dms = DmsModule::new(DmsConfig::default(), Box::new(Script(vec![])), None).unwrap();
        let alarm = AlarmController::new(
            Box::new(alerting::SilentAudioSink::new()),
            None,
            true,
            Handle::current(),
        );
        let mut monitor = MonitorLoop::new(
            Box::new(FailingSource),
            dms,
            alarm,
            Box::new(crate::sink::NullSink),
            SharedStatus::new(60),
            LoopOptions::default(),
        );
        let summary = monitor.run(&AtomicBool::new(false));
        assert_eq!(summary.frames, 0);
        assert!(matches!(summary.end, EndReason::SourceFailed(_)));
    }

    #[tokio::test]
    async fn test_quit_requests() {
        let mut h = harness(vec![Some(0.3); 10], Some(30.0), None, false);
        let summary = h.monitor.run(&AtomicBool::new(true));
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.end, EndReason::Quit);

        let mut h = harness(vec![Some(0.3); 10], Some(30.0), None, false);
        h.monitor.sink = Box::new(QuitAfter(3));
        let summary = h.monitor.run(&AtomicBool::new(false));
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.end, EndReason::Quit);
    }
}
