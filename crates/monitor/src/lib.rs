//! Drowsiness Monitor
//!
//! Wires the frame source, driver monitoring, alarm and voice override into
//! one monitoring session, with an optional HTTP status API.

use alerting::{AlarmController, AudioSink, ChannelRecognizer, SilentAudioSink, SpeechRecognizer};
use axum::{
    routing::{get, post},
    Router,
};
use camera_capture::{CameraError, SourceKind};
use dms::{DmsModule, TraceLandmarkProvider};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod console;
pub mod overlay;
pub mod pipeline;
mod routes;
pub mod settings;
pub mod sink;
pub mod status;

pub use pipeline::{EndReason, LoopOptions, MonitorLoop, RunSummary};
pub use settings::MonitorSettings;
pub use status::{MonitorStatus, SharedStatus};

use settings::{ApiSettings, AudioBackend, LoggingSettings};
use sink::{FrameSink, NullSink, PngDirSink};

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Driver monitoring error: {0}")]
    Dms(#[from] dms::DmsError),

    #[error("Alarm error: {0}")]
    Alarm(#[from] alerting::AlarmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Task failed: {0}")]
    Task(String),
}

/// State shared across API handlers
pub struct ApiState {
    pub status: SharedStatus,
    pub alarm: AlarmController,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl ApiState {
    pub fn new(status: SharedStatus, alarm: AlarmController, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            status,
            alarm,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Create the status API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::status::health))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/alarm", get(routes::alarm::get_alarm))
        .route("/api/v1/alarm/stop", post(routes::alarm::stop_alarm))
        .route("/metrics", get(routes::status::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(settings: &LoggingSettings) -> Result<(), MonitorError> {
    let level: Level = settings
        .level
        .parse()
        .map_err(|_| MonitorError::Config(format!("unknown log level {:?}", settings.level)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| MonitorError::Logging(e.to_string()))
}

/// Serve the status API until the process exits
pub async fn run_server(settings: &ApiSettings, state: Arc<ApiState>) -> Result<(), MonitorError> {
    let app = create_router(state);

    info!("Starting status API on {}", settings.bind);

    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn open_landmarks(settings: &MonitorSettings) -> Result<TraceLandmarkProvider, MonitorError> {
    let path = settings.landmarks.trace.as_ref().ok_or_else(|| {
        MonitorError::Config("no landmark source configured (set landmarks.trace)".into())
    })?;
    let provider = TraceLandmarkProvider::open(path)?;
    info!("Replaying {} landmark records from {}", provider.len(), path.display());
    Ok(provider)
}

fn open_audio(backend: AudioBackend) -> Box<dyn AudioSink> {
    match backend {
        AudioBackend::Silent => Box::new(SilentAudioSink::new()),
        #[cfg(feature = "audio")]
        AudioBackend::Device => match alerting::RodioAudioSink::open() {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                error!("Audio device unavailable, alarms will be silent: {}", e);
                Box::new(SilentAudioSink::new())
            }
        },
        #[cfg(not(feature = "audio"))]
        AudioBackend::Device => {
            warn!("Built without the audio feature, alarms will be silent");
            Box::new(SilentAudioSink::new())
        }
    }
}

fn open_sink(settings: &MonitorSettings) -> Result<Box<dyn FrameSink>, MonitorError> {
    match &settings.output.directory {
        Some(dir) => Ok(Box::new(PngDirSink::create(dir)?)),
        None => Ok(Box::new(NullSink)),
    }
}

/// Run one monitoring session to completion.
///
/// Must be called inside a multi-threaded tokio runtime: the frame loop runs
/// on the blocking pool and voice listeners share it.
pub async fn run(settings: MonitorSettings) -> Result<RunSummary, MonitorError> {
    let landmarks = open_landmarks(&settings)?;

    let mut source_config = settings.source.clone();
    if source_config.kind == SourceKind::Blank && source_config.frame_count.is_none() {
        source_config.frame_count = Some(landmarks.len() as u64);
    }
    let source = source_config.open()?;
    let dms = DmsModule::new(settings.dms.clone(), Box::new(landmarks), source.nominal_fps())?;

    let quit = Arc::new(AtomicBool::new(false));

    let (recognizer, utterances) = if settings.console.enabled && settings.alarm.voice.enabled {
        let (recognizer, tx) = ChannelRecognizer::new();
        (Some(Arc::new(recognizer) as Arc<dyn SpeechRecognizer>), Some(tx))
    } else {
        (None, None)
    };
    if settings.console.enabled {
        console::spawn(utterances, quit.clone())?;
    }

    let alarm = AlarmController::from_config(&settings.alarm, open_audio(settings.audio.backend), recognizer)?;
    let status = SharedStatus::new(dms.required_frames());

    if settings.api.enabled {
        let metrics = match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Metrics exporter not installed: {}", e);
                None
            }
        };
        let state = Arc::new(ApiState::new(status.clone(), alarm.clone(), metrics));
        let api = settings.api.clone();
        tokio::spawn(async move {
            if let Err(e) = run_server(&api, state).await {
                error!("Status API stopped: {}", e);
            }
        });
    }

    {
        let quit = quit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                quit.store(true, Ordering::SeqCst);
            }
        });
    }

    let options = LoopOptions {
        mirror: settings.source.mirror,
        annotate: settings.output.annotate,
    };
    let sink = open_sink(&settings)?;
    let mut monitor = MonitorLoop::new(source, dms, alarm.clone(), sink, status.clone(), options);

    let summary = tokio::task::spawn_blocking(move || monitor.run(&quit))
        .await
        .map_err(|e| MonitorError::Task(e.to_string()))?;

    alarm.stop();
    status.set_running(false);
    Ok(summary)
}
