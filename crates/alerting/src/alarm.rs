//! Alarm Controller Implementation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioError, AudioSink};
use crate::voice::{ListenOutcome, SpeechRecognizer, VoiceCommandListener, VoiceConfig};

/// Alarm error types
#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("Alarm playback failed: {0}")]
    Audio(#[from] AudioError),

    #[error("No tokio runtime available for the voice listener")]
    NoRuntime,
}

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Pre-recorded alarm sound, loaded once at startup
    pub asset: Option<PathBuf>,
    /// Repeat the sound until stopped
    pub loop_forever: bool,
    /// Voice command override
    pub voice: VoiceConfig,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            asset: Some(PathBuf::from("music.wav")),
            loop_forever: true,
            voice: VoiceConfig::default(),
        }
    }
}

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Playback began and a listener was launched
    Started,
    /// The alarm was already sounding; nothing changed
    AlreadyActive,
}

/// Counters kept under the alarm lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlarmStats {
    pub start_calls: u64,
    pub activations: u64,
    pub failed_starts: u64,
    pub stop_calls: u64,
    pub voice_stops: u64,
    pub listeners_spawned: u64,
}

struct AlarmState {
    active: bool,
    sink: Box<dyn AudioSink>,
    stats: AlarmStats,
}

struct Shared {
    state: Mutex<AlarmState>,
    listener: Option<VoiceCommandListener>,
    last_listener: Mutex<Option<JoinHandle<ListenOutcome>>>,
    loop_forever: bool,
    runtime: Handle,
}

/// Owns the "alarm active" flag and the playback device.
///
/// Cloning yields another handle to the same alarm. `start` and `stop` are
/// idempotent and may race freely from any thread; the last one to take
/// the lock decides the final state.
#[derive(Clone)]
pub struct AlarmController {
    shared: Arc<Shared>,
}

impl AlarmController {
    /// Create a controller whose listeners run on `runtime`'s blocking pool
    pub fn new(
        sink: Box<dyn AudioSink>,
        listener: Option<VoiceCommandListener>,
        loop_forever: bool,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(AlarmState {
                    active: false,
                    sink,
                    stats: AlarmStats::default(),
                }),
                listener,
                last_listener: Mutex::new(None),
                loop_forever,
                runtime,
            }),
        }
    }

    /// Build from configuration on the current tokio runtime.
    ///
    /// A missing or unreadable asset is logged, not fatal: later starts fail
    /// and detection carries on without sound.
    pub fn from_config(
        config: &AlarmConfig,
        mut sink: Box<dyn AudioSink>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
    ) -> Result<Self, AlarmError> {
        let runtime = Handle::try_current().map_err(|_| AlarmError::NoRuntime)?;

        match &config.asset {
            Some(asset) => {
                if let Err(e) = sink.load(asset) {
                    error!("Alarm asset unavailable, alarm will be silent: {}", e);
                }
            }
            None => warn!("No alarm asset configured"),
        }

        let listener = match recognizer {
            Some(recognizer) if config.voice.enabled => {
                Some(VoiceCommandListener::new(recognizer, config.voice.clone()))
            }
            _ => None,
        };
        info!(
            "Alarm ready (loop: {}, voice override: {})",
            config.loop_forever,
            listener.is_some()
        );

        Ok(Self::new(sink, listener, config.loop_forever, runtime))
    }

    fn lock(&self) -> MutexGuard<'_, AlarmState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the alarm if it is not already sounding.
    ///
    /// On playback failure the alarm stays inactive and the error is returned.
    pub fn start(&self) -> Result<StartOutcome, AlarmError> {
        {
            let mut state = self.lock();
            state.stats.start_calls += 1;

            if state.active {
                debug!("Alarm already active");
                return Ok(StartOutcome::AlreadyActive);
            }

            let loop_forever = self.shared.loop_forever;
            if let Err(e) = state.sink.play(loop_forever) {
                state.stats.failed_starts += 1;
                error!("Failed to start alarm playback: {}", e);
                return Err(e.into());
            }

            state.active = true;
            state.stats.activations += 1;
            if self.shared.listener.is_some() {
                state.stats.listeners_spawned += 1;
            }
        }

        warn!("Alarm started");
        self.spawn_listener();
        Ok(StartOutcome::Started)
    }

    fn spawn_listener(&self) {
        let Some(listener) = self.shared.listener.clone() else {
            return;
        };
        metrics::counter!("voice_listeners_spawned_total").increment(1);
        let alarm = self.clone();
        let task = self.shared.runtime.spawn_blocking(move || {
            let outcome = listener.run(&alarm);
            debug!("Voice listener finished: {:?}", outcome);
            outcome
        });

        // The previous listener, if still running, is abandoned rather than joined
        let mut slot = self
            .shared
            .last_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(task);
    }

    /// Stop playback and clear the active flag. Safe from any state.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.stats.stop_calls += 1;
        state.sink.stop();
        if state.active {
            info!("Alarm stopped");
        }
        state.active = false;
    }

    pub(crate) fn stop_by_voice(&self) {
        self.lock().stats.voice_stops += 1;
        metrics::counter!("alarm_voice_stops_total").increment(1);
        self.stop();
    }

    /// Whether the alarm is active
    pub fn is_running(&self) -> bool {
        self.lock().active
    }

    /// Whether the playback device reports sound
    pub fn is_playing(&self) -> bool {
        self.lock().sink.is_playing()
    }

    pub fn stats(&self) -> AlarmStats {
        self.lock().stats
    }

    pub fn has_voice_override(&self) -> bool {
        self.shared.listener.is_some()
    }

    /// Take the handle of the most recently spawned listener task
    pub fn take_listener(&self) -> Option<JoinHandle<ListenOutcome>> {
        self.shared
            .last_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
