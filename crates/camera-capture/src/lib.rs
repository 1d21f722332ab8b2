//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides the frame source abstraction consumed by the monitoring loop.
//! Supports:
//! - Image sequence directories (recorded sessions)
//! - Synthetic blank frames (landmark trace replay)
//! - Horizontal mirroring of decoded frames

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{BlankSource, ImageSequenceSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Frame rate assumed when a source cannot report a usable one
pub const FALLBACK_FPS: f64 = 30.0;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live or recorded sequence of frames.
///
/// `read_frame` blocks until the next frame is available. `Ok(None)` means
/// the source is exhausted and the caller should wind down.
pub trait FrameSource: Send {
    /// Nominal frame rate reported by the source, if known
    fn nominal_fps(&self) -> Option<f64>;

    /// Read the next frame
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Source kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Directory of still images, played back in file name order
    ImageSequence,
    /// Solid frames of a fixed size
    Blank,
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source kind
    pub kind: SourceKind,
    /// Image directory (image sequence only)
    pub directory: Option<PathBuf>,
    /// Frame width (blank only)
    pub width: u32,
    /// Frame height (blank only)
    pub height: u32,
    /// Number of frames to produce (blank only, unbounded if absent)
    pub frame_count: Option<u64>,
    /// Reported frame rate; zero or absent means unknown
    pub fps: Option<f64>,
    /// Mirror frames horizontally before analysis
    pub mirror: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Blank,
            directory: None,
            width: 640,
            height: 480,
            frame_count: None,
            fps: Some(FALLBACK_FPS),
            mirror: true,
        }
    }
}

impl SourceConfig {
    /// Open the configured source
    pub fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        match self.kind {
            SourceKind::ImageSequence => {
                let dir = self.directory.as_ref().ok_or_else(|| {
                    CameraError::Open("image_sequence source requires a directory".into())
                })?;
                Ok(Box::new(ImageSequenceSource::open(dir, self.fps)?))
            }
            SourceKind::Blank => Ok(Box::new(BlankSource::new(
                self.width,
                self.height,
                self.fps,
                self.frame_count,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_opens_blank_source() {
        let config = SourceConfig {
            frame_count: Some(2),
            ..Default::default()
        };
        let mut source = config.open().unwrap();
        assert_eq!(source.nominal_fps(), Some(30.0));
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_sequence_requires_directory() {
        let config = SourceConfig {
            kind: SourceKind::ImageSequence,
            ..Default::default()
        };
        assert!(matches!(config.open(), Err(CameraError::Open(_))));
    }
}
