//! Monitor settings
//!
//! Loaded from an optional TOML file layered under `DROWSY__*` environment
//! variables, e.g. `DROWSY__DMS__EAR_THRESHOLD=0.22`.

use alerting::AlarmConfig;
use camera_capture::SourceConfig;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::MonitorError;

/// Settings file read when none is given on the command line
pub const DEFAULT_SETTINGS_FILE: &str = "drowsiness-monitor.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Landmark input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSettings {
    /// JSON-lines landmark trace to replay
    pub trace: Option<PathBuf>,
}

/// Audio output backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioBackend {
    /// Log alarms without sound
    #[default]
    Silent,
    /// Default output device (requires the `audio` feature)
    Device,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub backend: AudioBackend,
}

/// Annotated frame output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Draw eye markers and the drowsiness banner
    pub annotate: bool,
    /// Write annotated frames as PNG files into this directory
    pub directory: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            annotate: true,
            directory: None,
        }
    }
}

/// Console input (quit key and typed voice commands)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub enabled: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Status API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// All monitor settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub source: SourceConfig,
    pub landmarks: LandmarkSettings,
    pub dms: DmsConfig,
    pub alarm: AlarmConfig,
    pub audio: AudioSettings,
    pub output: OutputSettings,
    pub console: ConsoleSettings,
    pub logging: LoggingSettings,
    pub api: ApiSettings,
}

impl MonitorSettings {
    /// Load settings from `path` (required) or the default file (optional),
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
