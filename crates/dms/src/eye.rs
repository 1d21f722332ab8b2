//! Eye openness estimation (eye aspect ratio)

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Number of contour points describing one eye
pub const EYE_CONTOUR_POINTS: usize = 6;

/// 2D point in frame pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyePoint {
    pub x: f32,
    pub y: f32,
}

impl EyePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &EyePoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Six-point eye contour in canonical order:
/// outer corner, upper lid 1, upper lid 2, inner corner, lower lid 2, lower lid 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeContour(pub [EyePoint; EYE_CONTOUR_POINTS]);

impl EyeContour {
    /// Build a contour from the first six points of a slice
    pub fn from_points(points: &[EyePoint]) -> Result<Self, DmsError> {
        if points.len() < EYE_CONTOUR_POINTS {
            return Err(DmsError::InvalidInput(format!(
                "eye contour needs {} points, got {}",
                EYE_CONTOUR_POINTS,
                points.len()
            )));
        }
        let mut contour = [EyePoint::default(); EYE_CONTOUR_POINTS];
        contour.copy_from_slice(&points[..EYE_CONTOUR_POINTS]);
        Ok(Self(contour))
    }

    pub fn points(&self) -> &[EyePoint; EYE_CONTOUR_POINTS] {
        &self.0
    }

    /// Eye aspect ratio of this contour.
    ///
    /// `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`. Coinciding corners only happen
    /// when tracking fails, so a zero width reads as a closed eye.
    pub fn aspect_ratio(&self) -> f32 {
        let [p1, p2, p3, p4, p5, p6] = &self.0;
        let horizontal = p1.distance(p4);
        if horizontal <= f32::EPSILON {
            return 0.0;
        }
        (p2.distance(p6) + p3.distance(p5)) / (2.0 * horizontal)
    }
}

/// Openness ratio of one eye from its contour points.
///
/// Fails with [`DmsError::InvalidInput`] when fewer than six points are given;
/// extra points are ignored.
pub fn estimate_openness(points: &[EyePoint]) -> Result<f32, DmsError> {
    Ok(EyeContour::from_points(points)?.aspect_ratio())
}

/// Frame openness: mean of both eyes
pub fn aggregate_openness(left: f32, right: f32) -> f32 {
    (left + right) / 2.0
}
