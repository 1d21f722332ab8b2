//! Alarm audio playback

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Audio error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Alarm asset not found: {0}")]
    AssetMissing(String),

    #[error("No alarm asset loaded")]
    NotLoaded,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Failed to decode alarm asset: {0}")]
    Decode(String),
}

/// Playback device for the alarm sound.
///
/// Calls are expected to return promptly; playback itself runs in the
/// background. `stop` must be safe to call when nothing is playing.
pub trait AudioSink: Send {
    /// Load the alarm asset, replacing any previous one
    fn load(&mut self, asset: &Path) -> Result<(), AudioError>;

    /// Start playback of the loaded asset
    fn play(&mut self, loop_forever: bool) -> Result<(), AudioError>;

    /// Stop playback
    fn stop(&mut self);

    fn is_playing(&self) -> bool;
}

/// Sink without an audio device: logs instead of sounding
#[derive(Debug, Default)]
pub struct SilentAudioSink {
    asset: Option<PathBuf>,
    playing: bool,
}

impl SilentAudioSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for SilentAudioSink {
    fn load(&mut self, asset: &Path) -> Result<(), AudioError> {
        if !asset.is_file() {
            return Err(AudioError::AssetMissing(asset.display().to_string()));
        }
        info!("Alarm asset {} registered (silent output)", asset.display());
        self.asset = Some(asset.to_path_buf());
        Ok(())
    }

    fn play(&mut self, loop_forever: bool) -> Result<(), AudioError> {
        let asset = self.asset.as_ref().ok_or(AudioError::NotLoaded)?;
        warn!("ALARM: {} (loop: {})", asset.display(), loop_forever);
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(feature = "audio")]
pub use self::device::RodioAudioSink;

#[cfg(feature = "audio")]
mod device {
    use super::{AudioError, AudioSink};
    use rodio::Source;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use tracing::{debug, error};

    enum Command {
        Play {
            asset: Arc<[u8]>,
            looped: bool,
            reply: mpsc::Sender<Result<(), AudioError>>,
        },
        Stop,
        IsPlaying(mpsc::Sender<bool>),
    }

    /// Plays the alarm on the default output device.
    ///
    /// The output stream is not `Send`, so it lives on a dedicated thread
    /// driven by commands.
    pub struct RodioAudioSink {
        commands: mpsc::Sender<Command>,
        asset: Option<Arc<[u8]>>,
    }

    impl RodioAudioSink {
        pub fn open() -> Result<Self, AudioError> {
            let (commands, rx) = mpsc::channel();
            let (ready_tx, ready_rx) = mpsc::channel();

            thread::Builder::new()
                .name("alarm-audio".into())
                .spawn(move || playback_thread(rx, ready_tx))
                .map_err(|e| AudioError::Device(e.to_string()))?;

            ready_rx
                .recv()
                .map_err(|_| AudioError::Device("audio thread exited".into()))??;

            Ok(Self { commands, asset: None })
        }

        fn send(&self, command: Command) -> Result<(), AudioError> {
            self.commands
                .send(command)
                .map_err(|_| AudioError::Device("audio thread exited".into()))
        }
    }

    fn playback_thread(rx: mpsc::Receiver<Command>, ready: mpsc::Sender<Result<(), AudioError>>) {
        let (_stream, handle) = match rodio::OutputStream::try_default() {
            Ok(output) => {
                let _ = ready.send(Ok(()));
                output
            }
            Err(e) => {
                let _ = ready.send(Err(AudioError::Device(e.to_string())));
                return;
            }
        };

        let mut sink: Option<rodio::Sink> = None;

        while let Ok(command) = rx.recv() {
            match command {
                Command::Play { asset, looped, reply } => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    let reply_result = match start_sink(&handle, asset, looped) {
                        Ok(new_sink) => {
                            sink = Some(new_sink);
                            Ok(())
                        }
                        Err(e) => {
                            error!("Alarm playback failed: {}", e);
                            Err(e)
                        }
                    };
                    let _ = reply.send(reply_result);
                }
                Command::Stop => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                }
                Command::IsPlaying(reply) => {
                    let playing = sink.as_ref().is_some_and(|s| !s.empty());
                    let _ = reply.send(playing);
                }
            }
        }
        debug!("Audio thread exiting");
    }

    fn start_sink(
        handle: &rodio::OutputStreamHandle,
        asset: Arc<[u8]>,
        looped: bool,
    ) -> Result<rodio::Sink, AudioError> {
        let sink = rodio::Sink::try_new(handle).map_err(|e| AudioError::Device(e.to_string()))?;
        let decoder = rodio::Decoder::new(Cursor::new(asset))
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        if looped {
            sink.append(decoder.repeat_infinite());
        } else {
            sink.append(decoder);
        }
        Ok(sink)
    }

    impl AudioSink for RodioAudioSink {
        fn load(&mut self, asset: &Path) -> Result<(), AudioError> {
            let bytes = std::fs::read(asset)
                .map_err(|e| AudioError::AssetMissing(format!("{}: {}", asset.display(), e)))?;
            self.asset = Some(Arc::from(bytes));
            Ok(())
        }

        fn play(&mut self, loop_forever: bool) -> Result<(), AudioError> {
            let asset = self.asset.clone().ok_or(AudioError::NotLoaded)?;
            let (reply, response) = mpsc::channel();
            self.send(Command::Play {
                asset,
                looped: loop_forever,
                reply,
            })?;
            response
                .recv()
                .map_err(|_| AudioError::Device("audio thread exited".into()))?
        }

        fn stop(&mut self) {
            let _ = self.send(Command::Stop);
        }

        fn is_playing(&self) -> bool {
            let (reply, response) = mpsc::channel();
            if self.send(Command::IsPlaying(reply)).is_err() {
                return false;
            }
            response.recv().unwrap_or(false)
        }
    }
}
