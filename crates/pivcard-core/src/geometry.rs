//! Eye-based rotation, compliance-driven cropping, and landmark re-projection.
//!
//! The three operations here always run in this order: rotate the full source image and its
//! landmarks, derive and apply a crop from the rotated landmarks, then resize the crop to the
//! output frame and re-project the landmarks into it. Rotating first means the crop derivation
//! never has to reason about rotation-induced black borders.

use pivcard_image::{Image, Point2D, Rect, Resolution, RotatedRect};

use crate::landmark::LandmarkResult;

/// Output frame dimensions mandated by INCITS 385-2004 §B.2.1.
pub const OUTPUT_WIDTH: u32 = 420;
pub const OUTPUT_HEIGHT: u32 = 560;

const MIN_CROP_WIDTH: u32 = 300;
const MIN_CROP_HEIGHT: u32 = 400;

/// Rotation angle, clamped to the configured cap, treated as exactly zero below 0.1 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationAngle {
    degrees: f32,
    clamped: bool,
}

impl RotationAngle {
    /// Computes the rotation needed to level the eyes, per §4.D.
    ///
    /// `max_rotation_degrees` bounds the magnitude of the result; the source tilt is never
    /// amplified beyond it.
    pub fn from_eyes(left_eye: Point2D, right_eye: Point2D, max_rotation_degrees: f32) -> Self {
        let raw = -(right_eye.y - left_eye.y).atan2(right_eye.x - left_eye.x).to_degrees();
        let clamped_value = raw.clamp(-max_rotation_degrees, max_rotation_degrees);
        let clamped = clamped_value != raw;

        let degrees = if clamped_value.abs() <= 0.1 { 0.0 } else { clamped_value };
        Self { degrees, clamped }
    }

    pub fn degrees(&self) -> f32 {
        self.degrees
    }

    pub fn radians(&self) -> f32 {
        self.degrees.to_radians()
    }

    /// Whether the raw eye-tilt angle exceeded `max_rotation_degrees` and had to be clamped.
    /// Per §4.E, `rotation_ok` requires this to be `false`.
    pub fn was_clamped(&self) -> bool {
        self.clamped
    }
}

/// Rotates `image` by `angle` around its center, returning the rotated image and the resolution
/// it occupies, per the frame-growth formula in §4.A.
pub fn rotate_image(image: &Image, angle: RotationAngle) -> Image {
    if angle.degrees() == 0.0 {
        return image.clone();
    }
    image.rotate_around_center(angle.radians())
}

/// Rotates every landmark from the coordinate frame of `image` into the coordinate frame of the
/// image that [`rotate_image`] produces for the same angle.
pub fn rotate_landmarks(landmarks: &LandmarkResult, source_res: Resolution, angle: RotationAngle) -> [Point2D; 68] {
    let mut out = *landmarks.points();
    if angle.degrees() == 0.0 {
        return out;
    }

    let old_center = Point2D::new(source_res.width() as f32 / 2.0, source_res.height() as f32 / 2.0);
    let new_res = RotatedRect::new(Rect::from_top_left(0, 0, source_res.width(), source_res.height()), angle.radians())
        .bounding_resolution();
    let new_center = Point2D::new(new_res.width() as f32 / 2.0, new_res.height() as f32 / 2.0);

    for point in &mut out {
        let rotated = point.rotate_around(old_center, angle.radians());
        *point = Point2D::new(
            rotated.x + (new_center.x - old_center.x),
            rotated.y + (new_center.y - old_center.y),
        );
    }
    out
}

/// Failure modes specific to the geometry stage.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("computed crop rectangle {width}x{height} is smaller than the minimum {min_width}x{min_height}")]
    CropTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("jaw contour landmarks are degenerate (zero width)")]
    DegenerateLandmarks,
}

/// The crop derived from the rotated landmarks, along with whether it had to be clamped to the
/// image bounds (a compliance warning, not a failure).
pub struct ComplianceCrop {
    pub rect: Rect,
    pub clamped_to_bounds: bool,
}

/// Derives the compliance-driven crop rectangle from rotated landmarks, per §4.D steps 1-6.
pub fn compute_crop(landmarks: &[Point2D; 68], bounds: Resolution) -> Result<ComplianceCrop, GeometryError> {
    let jaw = &landmarks[0..=16];
    let x_min = jaw.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let x_max = jaw.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let cc = x_max - x_min;
    if cc <= 0.0 {
        return Err(GeometryError::DegenerateLandmarks);
    }
    let aa_x = (x_min + x_max) / 2.0;

    let left_eye_center = centroid(&landmarks[36..=41]);
    let right_eye_center = centroid(&landmarks[42..=47]);
    let bb_y = (left_eye_center.y + right_eye_center.y) / 2.0;

    let k = OUTPUT_WIDTH as f32 / 240.0;
    let crop_w = cc * k;
    let crop_h = crop_w * (OUTPUT_HEIGHT as f32 / OUTPUT_WIDTH as f32);
    let crop_center_y = bb_y + 0.1 * crop_h;

    let ideal = Rect::from_center(aa_x, crop_center_y, crop_w.round() as u32, crop_h.round() as u32);
    let (clamped_rect, clamped_to_bounds) = clamp_to_bounds(ideal, bounds);

    if clamped_rect.width() < MIN_CROP_WIDTH || clamped_rect.height() < MIN_CROP_HEIGHT {
        return Err(GeometryError::CropTooSmall {
            width: clamped_rect.width(),
            height: clamped_rect.height(),
            min_width: MIN_CROP_WIDTH,
            min_height: MIN_CROP_HEIGHT,
        });
    }

    Ok(ComplianceCrop {
        rect: clamped_rect,
        clamped_to_bounds,
    })
}

fn clamp_to_bounds(rect: Rect, bounds: Resolution) -> (Rect, bool) {
    let mut clamped = false;

    let width = rect.width().min(bounds.width());
    let height = rect.height().min(bounds.height());
    if width != rect.width() || height != rect.height() {
        clamped = true;
    }

    let mut x = rect.x();
    let mut y = rect.y();
    if x < 0 {
        x = 0;
        clamped = true;
    }
    if y < 0 {
        y = 0;
        clamped = true;
    }
    if x as u32 + width > bounds.width() {
        x = (bounds.width() - width) as i32;
        clamped = true;
    }
    if y as u32 + height > bounds.height() {
        y = (bounds.height() - height) as i32;
        clamped = true;
    }

    (Rect::from_top_left(x, y, width, height), clamped)
}

fn centroid(points: &[Point2D]) -> Point2D {
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let n = points.len() as f32;
    Point2D::new(sx / n, sy / n)
}

/// Crops `image` to `crop.rect` and resizes the result to the 420x560 output frame using
/// "fill, then center-crop" mode.
pub fn crop_and_resize(image: &Image, crop: &Rect) -> Image {
    image.view(crop).fill_resize(Resolution::new(OUTPUT_WIDTH, OUTPUT_HEIGHT))
}

/// Re-projects a rotated-frame landmark into the 420x560 output frame, per §4.D.
pub fn reproject_landmark(point: Point2D, crop: &Rect) -> Point2D {
    let s = (OUTPUT_WIDTH as f32 / crop.width() as f32).max(OUTPUT_HEIGHT as f32 / crop.height() as f32);
    let off_x = (OUTPUT_WIDTH as f32 - crop.width() as f32 * s) / 2.0;
    let off_y = (OUTPUT_HEIGHT as f32 - crop.height() as f32 * s) / 2.0;

    Point2D::new(
        (point.x - crop.x() as f32) * s + off_x,
        (point.y - crop.y() as f32) * s + off_y,
    )
}

/// Re-projects all 68 landmarks into the 420x560 output frame.
pub fn reproject_landmarks(points: &[Point2D; 68], crop: &Rect) -> [Point2D; 68] {
    let mut out = *points;
    for point in &mut out {
        *point = reproject_landmark(*point, crop);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_tilt_is_treated_as_zero() {
        let left = Point2D::new(0.0, 0.0);
        let right = Point2D::new(100.0, 0.05);
        let angle = RotationAngle::from_eyes(left, right, 15.0);
        assert_eq!(angle.degrees(), 0.0);
        assert!(!angle.was_clamped());
    }

    #[test]
    fn large_tilt_is_clamped_to_max() {
        let left = Point2D::new(0.0, 0.0);
        let right = Point2D::new(10.0, 100.0);
        let angle = RotationAngle::from_eyes(left, right, 15.0);
        assert!(angle.was_clamped());
        assert!(angle.degrees().abs() <= 15.0 + 1e-4);
    }

    #[test]
    fn rotation_direction_corrects_clockwise_tilt() {
        // right eye lower than left eye (clockwise tilt) should rotate counter-clockwise (positive degrees)
        let left = Point2D::new(0.0, 0.0);
        let right = Point2D::new(100.0, 10.0);
        let angle = RotationAngle::from_eyes(left, right, 15.0);
        assert!(angle.degrees() > 0.0);
    }

    fn uniform_jaw(x_min: f32, x_max: f32, y: f32) -> [Point2D; 68] {
        let mut points = [Point2D::new(0.0, 0.0); 68];
        for (i, p) in points[0..=16].iter_mut().enumerate() {
            let t = i as f32 / 16.0;
            *p = Point2D::new(x_min + t * (x_max - x_min), y + 50.0);
        }
        for p in &mut points[36..=41] {
            *p = Point2D::new((x_min + x_max) / 2.0 - 20.0, y);
        }
        for p in &mut points[42..=47] {
            *p = Point2D::new((x_min + x_max) / 2.0 + 20.0, y);
        }
        points
    }

    #[test]
    fn compute_crop_targets_full_head_width() {
        let landmarks = uniform_jaw(300.0, 500.0, 300.0);
        let crop = compute_crop(&landmarks, Resolution::new(2000, 2000)).unwrap();
        // crop width should equal CC * (420/240)
        let expected_w = (200.0_f32 * (420.0 / 240.0)).round() as u32;
        assert_eq!(crop.rect.width(), expected_w);
    }

    #[test]
    fn compute_crop_rejects_tiny_crop() {
        let landmarks = uniform_jaw(0.0, 1.0, 0.0);
        let result = compute_crop(&landmarks, Resolution::new(2000, 2000));
        assert!(result.is_err());
    }

    #[test]
    fn reproject_centers_a_crop_matching_output_aspect() {
        let crop = Rect::from_top_left(100, 100, OUTPUT_WIDTH, OUTPUT_HEIGHT);
        let center = Point2D::new(100.0 + OUTPUT_WIDTH as f32 / 2.0, 100.0 + OUTPUT_HEIGHT as f32 / 2.0);
        let reprojected = reproject_landmark(center, &crop);
        assert!((reprojected.x - OUTPUT_WIDTH as f32 / 2.0).abs() < 1e-3);
        assert!((reprojected.y - OUTPUT_HEIGHT as f32 / 2.0).abs() < 1e-3);
    }
}
