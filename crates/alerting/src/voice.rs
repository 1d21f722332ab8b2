//! Voice command override for the alarm

use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::alarm::AlarmController;

/// Speech recognition error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("No speech before timeout")]
    Timeout,

    #[error("Speech not understood")]
    Unintelligible,

    #[error("Recognizer failure: {0}")]
    Backend(String),
}

/// Speech capture and transcription backend.
///
/// `listen` blocks for up to `timeout` waiting for speech to start, then
/// captures at most `phrase_limit` of it.
pub trait SpeechRecognizer: Send + Sync {
    fn listen(&self, timeout: Duration, phrase_limit: Duration) -> Result<String, SpeechError>;
}

/// Voice listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Spawn a listener whenever the alarm starts
    pub enabled: bool,
    /// Wait for speech to begin (seconds)
    pub timeout_secs: f64,
    /// Longest utterance captured (seconds)
    pub phrase_limit_secs: f64,
    /// Words that silence the alarm
    pub stop_keywords: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 5.0,
            phrase_limit_secs: 3.0,
            stop_keywords: vec!["stop".to_string(), "alarm".to_string()],
        }
    }
}

impl VoiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::ZERO)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.phrase_limit_secs).unwrap_or(Duration::ZERO)
    }
}

/// Intent of a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Stop,
    Unrecognized,
}

/// Classify a lowercase transcript against the stop keywords
pub fn classify(transcript: &str, stop_keywords: &[String]) -> VoiceCommand {
    let transcript = transcript.to_lowercase();
    if stop_keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && transcript.contains(&keyword.to_lowercase()))
    {
        VoiceCommand::Stop
    } else {
        VoiceCommand::Unrecognized
    }
}

/// What one listener run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    /// Stop intent heard; the alarm was stopped
    Stopped(String),
    /// Something was said but it was not a stop command
    Ignored(String),
    /// Nothing usable was heard
    NoCommand,
}

/// Single-shot listener that silences the alarm on a stop command
#[derive(Clone)]
pub struct VoiceCommandListener {
    recognizer: Arc<dyn SpeechRecognizer>,
    config: VoiceConfig,
}

impl VoiceCommandListener {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, config: VoiceConfig) -> Self {
        Self { recognizer, config }
    }

    /// Capture one utterance and return its lowercase transcript.
    ///
    /// Every recognizer failure degrades to `None`.
    pub fn listen_once(&self, timeout: Duration, phrase_limit: Duration) -> Option<String> {
        debug!("Listening for a voice command ({:?} timeout)", timeout);
        match self.recognizer.listen(timeout, phrase_limit) {
            Ok(transcript) => {
                let transcript = transcript.trim().to_lowercase();
                info!("Heard: {:?}", transcript);
                Some(transcript)
            }
            Err(SpeechError::Timeout) => {
                debug!("No voice command before timeout");
                None
            }
            Err(e) => {
                warn!("Voice command not recognized: {}", e);
                None
            }
        }
    }

    /// Listen once and stop `alarm` if a stop command was spoken
    pub fn run(&self, alarm: &AlarmController) -> ListenOutcome {
        let Some(transcript) = self.listen_once(self.config.timeout(), self.config.phrase_limit())
        else {
            return ListenOutcome::NoCommand;
        };

        match classify(&transcript, &self.config.stop_keywords) {
            VoiceCommand::Stop => {
                info!("Voice stop command received");
                alarm.stop_by_voice();
                ListenOutcome::Stopped(transcript)
            }
            VoiceCommand::Unrecognized => ListenOutcome::Ignored(transcript),
        }
    }
}

/// Recognizer fed with ready-made transcripts, e.g. typed console lines.
///
/// One listen at a time: a listen waits for any earlier one to finish
/// before its own timeout starts, so a listener spawned while another is
/// still waiting can live for up to twice the timeout.
pub struct ChannelRecognizer {
    utterances: Mutex<mpsc::Receiver<String>>,
}

impl ChannelRecognizer {
    /// Create the recognizer and the sender that feeds it
    pub fn new() -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                utterances: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl SpeechRecognizer for ChannelRecognizer {
    /// Only utterances sent after listening began count. The phrase limit has
    /// no meaning for complete transcripts and is ignored.
    fn listen(&self, timeout: Duration, _phrase_limit: Duration) -> Result<String, SpeechError> {
        let rx = self
            .utterances
            .lock()
            .map_err(|_| SpeechError::Backend("utterance queue poisoned".into()))?;
        let stale = rx.try_iter().count();
        if stale > 0 {
            debug!("Discarded {} utterances received before listening", stale);
        }
        match rx.recv_timeout(timeout) {
            Ok(text) if text.trim().is_empty() => Err(SpeechError::Unintelligible),
            Ok(text) => Ok(text),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(SpeechError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(SpeechError::Backend("utterance source closed".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        VoiceConfig::default().stop_keywords
    }

    #[test]
    fn test_classify_stop_keywords() {
        assert_eq!(classify("please stop", &keywords()), VoiceCommand::Stop);
        assert_eq!(classify("Turn off the ALARM", &keywords()), VoiceCommand::Stop);
        assert_eq!(classify("i am awake", &keywords()), VoiceCommand::Unrecognized);
        assert_eq!(classify("", &keywords()), VoiceCommand::Unrecognized);
        assert_eq!(classify("anything", &[String::new()]), VoiceCommand::Unrecognized);
    }

    fn say_later(tx: mpsc::Sender<String>, text: &str) -> std::thread::JoinHandle<()> {
        let text = text.to_string();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let _ = tx.send(text);
        })
    }

    #[test]
    fn test_listen_once_lowercases() {
        let (recognizer, tx) = ChannelRecognizer::new();
        let listener = VoiceCommandListener::new(Arc::new(recognizer), VoiceConfig::default());
        let speaker = say_later(tx, "  Stop It  ");
        assert_eq!(
            listener.listen_once(Duration::from_secs(2), Duration::from_secs(1)),
            Some("stop it".to_string())
        );
        speaker.join().unwrap();
    }

    #[test]
    fn test_failures_degrade_to_none() {
        let (recognizer, tx) = ChannelRecognizer::new();
        let listener = VoiceCommandListener::new(Arc::new(recognizer), VoiceConfig::default());
        let short = Duration::from_millis(20);

        assert_eq!(listener.listen_once(short, short), None);

        let speaker = say_later(tx.clone(), "   ");
        assert_eq!(listener.listen_once(Duration::from_secs(2), short), None);
        speaker.join().unwrap();

        drop(tx);
        assert_eq!(listener.listen_once(short, short), None);
    }

    #[test]
    fn test_utterances_before_listening_are_ignored() {
        let (recognizer, tx) = ChannelRecognizer::new();
        tx.send("stop".to_string()).unwrap();
        tx.send("stop".to_string()).unwrap();
        assert_eq!(
            recognizer.listen(Duration::from_millis(10), Duration::ZERO),
            Err(SpeechError::Timeout)
        );
    }

    #[test]
    fn test_overlapping_listens_run_one_at_a_time() {
        let (recognizer, _tx) = ChannelRecognizer::new();
        let recognizer = Arc::new(recognizer);
        let timeout = Duration::from_millis(300);

        let first = {
            let recognizer = recognizer.clone();
            std::thread::spawn(move || recognizer.listen(timeout, Duration::ZERO))
        };
        std::thread::sleep(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let second = recognizer.listen(timeout, Duration::ZERO);

        assert_eq!(second, Err(SpeechError::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(first.join().unwrap(), Err(SpeechError::Timeout));
    }

    #[test]
    fn test_negative_durations_clamp_to_zero() {
        let config = VoiceConfig {
            timeout_secs: -1.0,
            phrase_limit_secs: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::ZERO);
        assert_eq!(config.phrase_limit(), Duration::ZERO);
    }
}
