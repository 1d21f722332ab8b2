//! Facial landmark input and eye contour extraction

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

use crate::eye::{EyeContour, EyePoint, EYE_CONTOUR_POINTS};
use crate::DmsError;

/// Left eye contour indices in the 468-point face mesh
pub const LEFT_EYE_INDICES: [usize; EYE_CONTOUR_POINTS] = [33, 160, 158, 133, 153, 144];

/// Right eye contour indices in the 468-point face mesh
pub const RIGHT_EYE_INDICES: [usize; EYE_CONTOUR_POINTS] = [362, 385, 387, 263, 373, 380];

/// Coordinates a landmark may take; NaN never falls inside
const NORMALIZED_RANGE: std::ops::RangeInclusive<f32> = 0.0..=1.0;

/// How a landmark set is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkLayout {
    /// Full face mesh, eyes picked by [`LEFT_EYE_INDICES`] / [`RIGHT_EYE_INDICES`]
    FaceMesh,
    /// Twelve points: left eye contour followed by right eye contour
    EyesOnly,
}

impl LandmarkLayout {
    fn eye_indices(&self) -> ([usize; EYE_CONTOUR_POINTS], [usize; EYE_CONTOUR_POINTS]) {
        match self {
            Self::FaceMesh => (LEFT_EYE_INDICES, RIGHT_EYE_INDICES),
            Self::EyesOnly => ([0, 1, 2, 3, 4, 5], [6, 7, 8, 9, 10, 11]),
        }
    }
}

/// Normalized (0..1) landmarks of one face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub layout: LandmarkLayout,
    pub points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    pub fn face_mesh(points: Vec<(f32, f32)>) -> Self {
        Self {
            layout: LandmarkLayout::FaceMesh,
            points,
        }
    }

    /// Landmarks consisting of the two eye contours only
    pub fn eyes_only(left: [(f32, f32); 6], right: [(f32, f32); 6]) -> Self {
        Self {
            layout: LandmarkLayout::EyesOnly,
            points: left.into_iter().chain(right).collect(),
        }
    }

    /// Left and right eye contours scaled into `width` x `height` pixel space
    pub fn eye_contours(&self, width: u32, height: u32) -> Result<(EyeContour, EyeContour), DmsError> {
        let (left, right) = self.layout.eye_indices();
        Ok((
            self.contour(&left, width, height)?,
            self.contour(&right, width, height)?,
        ))
    }

    fn contour(
        &self,
        indices: &[usize; EYE_CONTOUR_POINTS],
        width: u32,
        height: u32,
    ) -> Result<EyeContour, DmsError> {
        let points = indices
            .iter()
            .map(|&i| -> Result<EyePoint, DmsError> {
                let &(x, y) = self.points.get(i).ok_or_else(|| {
                    DmsError::InvalidInput(format!(
                        "landmark {} missing from set of {}",
                        i,
                        self.points.len()
                    ))
                })?;
                if !(NORMALIZED_RANGE.contains(&x) && NORMALIZED_RANGE.contains(&y)) {
                    return Err(DmsError::InvalidInput(format!(
                        "landmark {} at ({}, {}) outside the normalized frame",
                        i, x, y
                    )));
                }
                Ok(EyePoint::new(x * width as f32, y * height as f32))
            })
            .collect::<Result<Vec<_>, _>>()?;
        EyeContour::from_points(&points)
    }
}

/// Face landmark model.
///
/// Returns `Ok(None)` when no face is visible in the frame.
pub trait LandmarkProvider: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError>;
}

/// One line of a landmark trace
#[derive(Debug, Clone, Default, Deserialize)]
struct TraceRecord {
    #[serde(default)]
    mesh: Option<Vec<(f32, f32)>>,
    #[serde(default)]
    left_eye: Option<[(f32, f32); 6]>,
    #[serde(default)]
    right_eye: Option<[(f32, f32); 6]>,
}

impl TraceRecord {
    fn into_landmarks(self, line: usize) -> Result<Option<FaceLandmarks>, DmsError> {
        match (self.mesh, self.left_eye, self.right_eye) {
            (Some(mesh), None, None) => Ok(Some(FaceLandmarks::face_mesh(mesh))),
            (None, Some(left), Some(right)) => Ok(Some(FaceLandmarks::eyes_only(left, right))),
            (None, None, None) => Ok(None),
            _ => Err(DmsError::Trace(format!(
                "line {}: expected either `mesh` or both `left_eye` and `right_eye`",
                line
            ))),
        }
    }
}

/// Replays recorded landmarks, one JSON object per frame.
///
/// Frame `n` gets record `n`; frames past the end of the trace have no face.
/// Accepted records:
///
/// ```text
/// {"mesh": [[x, y], ...]}
/// {"left_eye": [[x, y] x6], "right_eye": [[x, y] x6]}
/// {}
/// ```
pub struct TraceLandmarkProvider {
    records: Vec<Option<FaceLandmarks>>,
}

impl TraceLandmarkProvider {
    pub fn open(path: &Path) -> Result<Self, DmsError> {
        let file = std::fs::File::open(path)
            .map_err(|e| DmsError::Trace(format!("{}: {}", path.display(), e)))?;
        let provider = Self::from_reader(std::io::BufReader::new(file))?;
        info!("Loaded landmark trace {} ({} frames)", path.display(), provider.len());
        Ok(provider)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, DmsError> {
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| DmsError::Trace(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: TraceRecord = serde_json::from_str(line)
                .map_err(|e| DmsError::Trace(format!("line {}: {}", idx + 1, e)))?;
            records.push(record.into_landmarks(idx + 1)?);
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LandmarkProvider for TraceLandmarkProvider {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        let landmarks = self
            .records
            .get(frame.sequence as usize)
            .cloned()
            .flatten();
        if landmarks.is_none() {
            debug!("No face in trace for frame {}", frame.sequence);
        }
        Ok(landmarks)
    }
}
