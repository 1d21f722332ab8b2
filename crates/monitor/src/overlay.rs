//! Frame annotation: eye markers and drowsiness warning

use ab_glyph::{FontRef, PxScale};
use camera_capture::{CameraError, VideoFrame};
use dms::{DmsAnalysis, EyePoint};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use tracing::warn;

const MARKER: Rgb<u8> = Rgb([0, 255, 0]);
const WARNING: Rgb<u8> = Rgb([255, 0, 0]);
const WARNING_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const MARKER_RADIUS: i32 = 2;
const BORDER: u32 = 3;
const TEXT_MARGIN: u32 = 4;
/// Smallest legible text height in pixels
const MIN_TEXT_SCALE: f32 = 8.0;

/// Banner text shown while drowsy
pub const WARNING_MESSAGE: &str = "DROWSINESS DETECTED!";

static FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// Draw every eye contour point and, while drowsy, a red banner with the
/// warning message and a red border
pub fn annotate(frame: &mut VideoFrame, analysis: &DmsAnalysis) -> Result<(), CameraError> {
    if frame.width == 0 || frame.height == 0 || (analysis.eyes.is_none() && !analysis.drowsy) {
        return Ok(());
    }
    let mut image = frame.to_image()?;

    if let Some(eyes) = &analysis.eyes {
        for point in eyes.left.points().iter().chain(eyes.right.points()) {
            if !inside(point, frame.width, frame.height) {
                continue;
            }
            draw_filled_circle_mut(
                &mut image,
                (point.x.round() as i32, point.y.round() as i32),
                MARKER_RADIUS,
                MARKER,
            );
        }
    }

    if analysis.drowsy {
        let banner_height = (frame.height / 10).max(1);
        draw_filled_rect_mut(
            &mut image,
            Rect::at(0, 0).of_size(frame.width, banner_height),
            WARNING,
        );
        draw_warning_text(&mut image, banner_height);
        for inset in 0..BORDER.min(frame.width / 2).min(frame.height / 2) {
            draw_hollow_rect_mut(
                &mut image,
                Rect::at(inset as i32, inset as i32)
                    .of_size(frame.width - 2 * inset, frame.height - 2 * inset),
                WARNING,
            );
        }
    }

    frame.data = image.into_raw();
    Ok(())
}

fn inside(point: &EyePoint, width: u32, height: u32) -> bool {
    (0.0..=width as f32).contains(&point.x) && (0.0..=height as f32).contains(&point.y)
}

/// White message in the top banner, shrunk to fit the frame width
fn draw_warning_text(image: &mut RgbImage, banner_height: u32) {
    let font = match FontRef::try_from_slice(FONT_DATA) {
        Ok(font) => font,
        Err(e) => {
            warn!("Warning font unusable: {}", e);
            return;
        }
    };
    let available = image.width().saturating_sub(2 * TEXT_MARGIN);
    let mut scale = PxScale::from(banner_height as f32 * 0.8);
    let (text_width, _) = text_size(scale, &font, WARNING_MESSAGE);
    if text_width > available && text_width > 0 {
        let shrink = available as f32 / text_width as f32;
        scale = PxScale::from(scale.y * shrink);
    }
    if scale.y < MIN_TEXT_SCALE {
        return;
    }
    let (_, text_height) = text_size(scale, &font, WARNING_MESSAGE);
    let y = banner_height.saturating_sub(text_height) / 2;
    draw_text_mut(
        image,
        WARNING_TEXT,
        TEXT_MARGIN as i32,
        y as i32,
        scale,
        &font,
        WARNING_MESSAGE,
    );
}
