//! Compliance engine: derives the AA/BB/CC reference lines from the final, re-projected
//! landmarks and validates them against the PIV thresholds from INCITS 385-2004 §B.2.1.

use pivcard_image::Point2D;

use crate::geometry::{OUTPUT_HEIGHT, OUTPUT_WIDTH};

const HEAD_WIDTH_RANGE: std::ops::RangeInclusive<f32> = 210.0..=240.0;
const EYE_POSITION_RANGE: std::ops::RangeInclusive<f32> = 0.40..=0.45;
/// Eye-position tolerance, as a fraction of image height, that downgrades a failure to a warning.
const EYE_POSITION_WARNING_MARGIN: f32 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

/// The AA/BB/CC reference lines, recomputed in the final 420x560 frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivLines {
    pub aa_x: f32,
    pub bb_y: f32,
    pub cc_width: f32,
}

impl PivLines {
    /// Derives the three lines from the final-frame landmarks, the same way
    /// [`crate::geometry::compute_crop`] does for the rotated frame.
    pub fn from_landmarks(landmarks: &[Point2D; 68]) -> Self {
        let jaw = &landmarks[0..=16];
        let x_min = jaw.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let x_max = jaw.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);

        let left_eye = centroid(&landmarks[36..=41]);
        let right_eye = centroid(&landmarks[42..=47]);

        Self {
            aa_x: (x_min + x_max) / 2.0,
            bb_y: (left_eye.y + right_eye.y) / 2.0,
            cc_width: x_max - x_min,
        }
    }
}

fn centroid(points: &[Point2D]) -> Point2D {
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let n = points.len() as f32;
    Point2D::new(sx / n, sy / n)
}

/// Validation outcome for a final, encoded output image.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    pub lines: PivLines,
    pub head_width_ok: bool,
    pub eye_position_ok: bool,
    pub rotation_ok: bool,
    pub severity: Severity,
    pub issues: Vec<String>,
}

impl ComplianceReport {
    /// Builds the report from the final landmarks and whether the applied rotation hit its cap.
    pub fn evaluate(landmarks: &[Point2D; 68], rotation_was_clamped: bool) -> Self {
        let lines = PivLines::from_landmarks(landmarks);
        let mut issues = Vec::new();

        let head_width_ok = HEAD_WIDTH_RANGE.contains(&lines.cc_width);
        if !head_width_ok {
            issues.push(format!(
                "head width {:.1}px outside required range [{:.0}, {:.0}]",
                lines.cc_width,
                HEAD_WIDTH_RANGE.start(),
                HEAD_WIDTH_RANGE.end(),
            ));
        }

        let eye_ratio = lines.bb_y / OUTPUT_HEIGHT as f32;
        let eye_position_ok = EYE_POSITION_RANGE.contains(&eye_ratio);
        let eye_position_near_ok = eye_ratio >= EYE_POSITION_RANGE.start() - EYE_POSITION_WARNING_MARGIN
            && eye_ratio <= EYE_POSITION_RANGE.end() + EYE_POSITION_WARNING_MARGIN;
        if !eye_position_ok {
            issues.push(format!(
                "eye line at {:.1}% of height, outside required range [{:.0}%, {:.0}%]",
                eye_ratio * 100.0,
                EYE_POSITION_RANGE.start() * 100.0,
                EYE_POSITION_RANGE.end() * 100.0,
            ));
        }

        let rotation_ok = !rotation_was_clamped;
        if !rotation_ok {
            issues.push("applied rotation was clamped to the configured maximum".to_string());
        }

        let severity = if head_width_ok && eye_position_ok && rotation_ok {
            Severity::Ok
        } else if !head_width_ok || !rotation_ok {
            Severity::Error
        } else if eye_position_near_ok {
            Severity::Warning
        } else {
            Severity::Error
        };

        Self {
            lines,
            head_width_ok,
            eye_position_ok,
            rotation_ok,
            severity,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmarks_with(cc_width: f32, eye_ratio: f32) -> [Point2D; 68] {
        let mut points = [Point2D::new(0.0, 0.0); 68];
        let x_min = (OUTPUT_WIDTH as f32 - cc_width) / 2.0;
        let x_max = x_min + cc_width;
        for (i, p) in points[0..=16].iter_mut().enumerate() {
            let t = i as f32 / 16.0;
            *p = Point2D::new(x_min + t * (x_max - x_min), 0.0);
        }
        let eye_y = eye_ratio * OUTPUT_HEIGHT as f32;
        for p in &mut points[36..=41] {
            *p = Point2D::new(x_min, eye_y);
        }
        for p in &mut points[42..=47] {
            *p = Point2D::new(x_max, eye_y);
        }
        points
    }

    #[test]
    fn fully_compliant_landmarks_report_ok() {
        let landmarks = landmarks_with(230.0, 0.42);
        let report = ComplianceReport::evaluate(&landmarks, false);
        assert_eq!(report.severity, Severity::Ok);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn narrow_head_width_is_an_error() {
        let landmarks = landmarks_with(150.0, 0.42);
        let report = ComplianceReport::evaluate(&landmarks, false);
        assert!(!report.head_width_ok);
        assert_eq!(report.severity, Severity::Error);
    }

    #[test]
    fn slightly_off_eye_position_is_a_warning() {
        let landmarks = landmarks_with(230.0, 0.47);
        let report = ComplianceReport::evaluate(&landmarks, false);
        assert!(!report.eye_position_ok);
        assert_eq!(report.severity, Severity::Warning);
    }

    #[test]
    fn clamped_rotation_is_an_error() {
        let landmarks = landmarks_with(230.0, 0.42);
        let report = ComplianceReport::evaluate(&landmarks, true);
        assert!(!report.rotation_ok);
        assert_eq!(report.severity, Severity::Error);
    }
}
