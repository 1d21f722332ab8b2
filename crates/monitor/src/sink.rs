//! Annotated frame presentation

use camera_capture::VideoFrame;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::MonitorError;

/// What the loop should do after a frame was presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    /// The viewer asked to quit
    Quit,
}

/// Display or recording of annotated frames
pub trait FrameSink: Send {
    fn present(&mut self, frame: &VideoFrame) -> Result<SinkControl, MonitorError>;
}

/// Discards frames
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &VideoFrame) -> Result<SinkControl, MonitorError> {
        Ok(SinkControl::Continue)
    }
}

/// Writes each frame as `frame_NNNNNN.png`
pub struct PngDirSink {
    directory: PathBuf,
    written: u64,
}

impl PngDirSink {
    pub fn create(directory: &Path) -> Result<Self, MonitorError> {
        std::fs::create_dir_all(directory)?;
        info!("Writing annotated frames to {}", directory.display());
        Ok(Self {
            directory: directory.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngDirSink {
    fn present(&mut self, frame: &VideoFrame) -> Result<SinkControl, MonitorError> {
        let path = self.directory.join(format!("frame_{:06}.png", frame.sequence));
        frame.to_image()?.save(&path).map_err(camera_capture::CameraError::from)?;
        self.written += 1;
        debug!("Saved {}", path.display());
        Ok(SinkControl::Continue)
    }
}
