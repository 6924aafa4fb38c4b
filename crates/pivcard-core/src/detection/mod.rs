//! Raw detector output types shared by the face detector and its suppression pass.

pub mod anchors;
pub mod nms;
pub mod retinaface;

use pivcard_image::{Rect, Resolution};

/// A bounding box in normalised `[0, 1]` center/size form, as produced directly by the detector
/// network before it is translated into source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRect {
    pub xc: f32,
    pub yc: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingRect {
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self { xc, yc, w, h }
    }

    /// Converts to pixel coordinates within an image of resolution `res`.
    pub fn to_rect(&self, res: &Resolution) -> Rect {
        let w = res.width() as f32;
        let h = res.height() as f32;
        Rect::from_center(self.xc * w, self.yc * h, (self.w * w) as u32, (self.h * h) as u32)
    }

    /// Scales width and height around the same center, used in tests to synthesize overlap.
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            xc: self.xc,
            yc: self.yc,
            w: self.w * factor,
            h: self.h * factor,
        }
    }

    /// Computes the intersection-over-union with `other`, treating both as axis-aligned boxes in
    /// normalised space.
    pub fn iou(&self, other: &BoundingRect) -> f32 {
        let (ax0, ax1) = (self.xc - self.w / 2.0, self.xc + self.w / 2.0);
        let (ay0, ay1) = (self.yc - self.h / 2.0, self.yc + self.h / 2.0);
        let (bx0, bx1) = (other.xc - other.w / 2.0, other.xc + other.w / 2.0);
        let (by0, by1) = (other.yc - other.h / 2.0, other.yc + other.h / 2.0);

        let ix0 = ax0.max(bx0);
        let iy0 = ay0.max(by0);
        let ix1 = ax1.min(bx1);
        let iy1 = ay1.min(by1);

        let iw = (ix1 - ix0).max(0.0);
        let ih = (iy1 - iy0).max(0.0);
        let intersection = iw * ih;
        if intersection <= 0.0 {
            return 0.0;
        }

        let area_a = self.w * self.h;
        let area_b = other.w * other.h;
        intersection / (area_a + area_b - intersection)
    }
}

/// A single 2D keypoint in normalised `[0, 1]` image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

/// A raw detection, in normalised coordinates, as produced by the network before translation
/// into source-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub(crate) confidence: f32,
    rect: BoundingRect,
    pub(crate) keypoints: Vec<Keypoint>,
}

impl RawDetection {
    pub fn new(confidence: f32, rect: BoundingRect) -> Self {
        Self {
            confidence,
            rect,
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(confidence: f32, rect: BoundingRect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_rect(&self) -> BoundingRect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: BoundingRect) {
        self.rect = rect;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoints_mut(&mut self) -> &mut Vec<Keypoint> {
        &mut self.keypoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let rect = BoundingRect::from_center(0.0, 0.0, 1.0, 1.0);
        assert_eq!(rect.iou(&rect), 1.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingRect::from_center(0.0, 0.0, 1.0, 1.0);
        let b = BoundingRect::from_center(10.0, 10.0, 1.0, 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_touching_boxes_is_zero() {
        let a = BoundingRect::from_center(0.0, 0.0, 1.0, 1.0);
        let b = BoundingRect::from_center(1.0, 0.0, 1.0, 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }
}
