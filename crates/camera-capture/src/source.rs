//! File-backed and synthetic frame sources

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{CameraError, FrameSource, VideoFrame};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

fn frame_timestamp_ns(sequence: u64, fps: Option<f64>) -> u64 {
    match fps {
        Some(fps) if fps.is_finite() && fps > 0.0 => (sequence as f64 * 1e9 / fps) as u64,
        _ => 0,
    }
}

/// Plays back a directory of still images in file name order
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    fps: Option<f64>,
}

impl ImageSequenceSource {
    /// Scan `dir` for images
    pub fn open(dir: &Path, fps: Option<f64>) -> Result<Self, CameraError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        info!("Image sequence {} opened with {} frames", dir.display(), paths.len());

        Ok(Self { paths, next: 0, fps })
    }

    /// Number of frames not yet read
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next
    }
}

impl FrameSource for ImageSequenceSource {
    fn nominal_fps(&self) -> Option<f64> {
        self.fps
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let sequence = self.next as u64;
        self.next += 1;

        debug!("Decoding {}", path.display());
        let image = image::open(path)?.to_rgb8();

        Ok(Some(VideoFrame::from_image(
            image,
            frame_timestamp_ns(sequence, self.fps),
            sequence as u32,
        )))
    }
}

/// Produces mid-gray frames of a fixed size
pub struct BlankSource {
    width: u32,
    height: u32,
    fps: Option<f64>,
    limit: Option<u64>,
    produced: u64,
}

impl BlankSource {
    pub fn new(
        width: u32,
        height: u32,
        fps: Option<f64>,
        limit: Option<u64>,
    ) -> Result<Self, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::Format(format!("invalid frame size {}x{}", width, height)));
        }
        Ok(Self {
            width,
            height,
            fps,
            limit,
            produced: 0,
        })
    }
}

impl FrameSource for BlankSource {
    fn nominal_fps(&self) -> Option<f64> {
        self.fps
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        let sequence = self.produced;
        self.produced += 1;

        Ok(Some(VideoFrame::solid(
            self.width,
            self.height,
            [128, 128, 128],
            frame_timestamp_ns(sequence, self.fps),
            sequence as u32,
        )))
    }
}
