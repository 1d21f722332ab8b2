//! Alarm and Voice Override
//!
//! Provides the drowsiness alarm: idempotent start/stop of looped playback
//! shared between the detection loop and a voice command listener that can
//! silence it.

pub mod alarm;
pub mod audio;
pub mod voice;

pub use alarm::{AlarmConfig, AlarmController, AlarmError, AlarmStats, StartOutcome};
pub use audio::{AudioError, AudioSink, SilentAudioSink};
#[cfg(feature = "audio")]
pub use audio::RodioAudioSink;
pub use voice::{
    classify, ChannelRecognizer, ListenOutcome, SpeechError, SpeechRecognizer, VoiceCommand,
    VoiceCommandListener, VoiceConfig,
};
