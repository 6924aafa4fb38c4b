//! RetinaFace-style face detector.
//!
//! Runs a single-stage anchor-based detector over a letterboxed 640x640 input, decodes the
//! variance-encoded box/landmark offsets relative to the anchor grid, and performs non-maximum
//! suppression over the surviving candidates.

use pivcard_image::{Color, Image, Point2D, Rect, Resolution};
use pivcard_nn::{Cnn, CnnInputShape, NeuralNetwork};
use pivcard_utils::timer::Timer;

use super::anchors::{AnchorParams, Anchors};
use super::nms::{NonMaxSuppression, SuppressionMode};
use super::{BoundingRect, Keypoint, RawDetection};

/// Variance constants used to decode the network's box/landmark offsets, per the RetinaFace
/// encoding convention: offsets for box/landmark centers are scaled by `CENTER_VARIANCE`, and
/// box size log-offsets are scaled by `SIZE_VARIANCE`.
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;

/// Confidence candidates below this score are discarded before NMS even runs. This is
/// deliberately a fixed, non-configurable floor distinct from
/// [`crate::options::ProcessingOptions::min_face_confidence`], which filters the already-decoded,
/// user-facing detections after this pass.
const RAW_CONFIDENCE_FLOOR: f32 = 0.9;

/// Minimum width and height, in source-image pixels, for a candidate to be kept.
const MIN_FACE_SIDE_PX: f32 = 20.0;

const NMS_IOU_THRESHOLD: f32 = 0.4;

/// Hard cap on the number of detections returned from the raw decode pass, applied before NMS.
const MAX_RAW_DETECTIONS: usize = 750;

/// A detected face, with its bounding box and 5-point landmark set (eyes, nose, mouth corners)
/// expressed in source-image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    rect: Rect,
    confidence: f32,
    landmarks: [Point2D; 5],
}

impl Detection {
    /// Builds a detection directly, bypassing the network. Used to construct fixed test doubles
    /// (see `crate::traits::testing`) and in this module's own tests.
    pub fn new(rect: Rect, confidence: f32, landmarks: [Point2D; 5]) -> Self {
        Self { rect, confidence, landmarks }
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the 5 detector landmarks, in source-image pixel coordinates, in the fixed order
    /// left eye, right eye, nose tip, left mouth corner, right mouth corner.
    pub fn landmarks(&self) -> &[Point2D; 5] {
        &self.landmarks
    }

    pub fn left_eye(&self) -> Point2D {
        self.landmarks[0]
    }

    pub fn right_eye(&self) -> Point2D {
        self.landmarks[1]
    }
}

/// Loads and runs the face detection network.
pub struct Detector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    t_resize: Timer,
    t_infer: Timer,
    t_decode: Timer,
}

impl Detector {
    /// Builds a detector around an already-loaded network, generating the anchor grid to match.
    pub fn new(nn: NeuralNetwork) -> anyhow::Result<Self> {
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, bgr_mean_subtract)?;
        let params = AnchorParams::DEFAULT;
        anyhow::ensure!(
            cnn.input_resolution() == Resolution::new(params.input_size, params.input_size),
            "face detection network input resolution {} does not match anchor grid input size {}",
            cnn.input_resolution(),
            params.input_size,
        );

        Ok(Self {
            cnn,
            anchors: Anchors::generate(&params),
            nms: NonMaxSuppression::new(NMS_IOU_THRESHOLD, SuppressionMode::Remove),
            t_resize: Timer::new("resize"),
            t_infer: Timer::new("infer"),
            t_decode: Timer::new("decode"),
        })
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        [&self.t_resize, &self.t_infer, &self.t_decode].into_iter()
    }

    /// Detects faces in `image`, returning them ordered from highest to lowest confidence.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.cnn.input_resolution();

        let letterboxed = self
            .t_resize
            .time(|| image.aspect_aware_resize(input_res));
        let content_rect = input_res.fit_aspect_ratio(image.resolution().aspect_ratio());

        let outputs = self.t_infer.time(|| self.cnn.estimate(&letterboxed))?;
        anyhow::ensure!(
            outputs.len() == 3,
            "face detection network must have exactly 3 outputs (box, confidence, landmarks), got {}",
            outputs.len(),
        );

        let raw = self.t_decode.time(|| {
            decode(&outputs[0], &outputs[1], &outputs[2], &self.anchors, input_res)
        })?;

        let mut raw = raw;
        raw.truncate(MAX_RAW_DETECTIONS);
        let suppressed = self.nms.process(raw);

        let detections = suppressed
            .into_iter()
            .filter_map(|det| to_detection(det, input_res, &content_rect, image.resolution()))
            .collect();
        Ok(detections)
    }
}

fn bgr_mean_subtract(color: Color) -> [f32; 3] {
    [
        color.b() as f32 - 104.0,
        color.g() as f32 - 117.0,
        color.r() as f32 - 123.0,
    ]
}

fn decode(
    boxes: &pivcard_nn::tensor::Tensor,
    scores: &pivcard_nn::tensor::Tensor,
    landmarks: &pivcard_nn::tensor::Tensor,
    anchors: &Anchors,
    input_res: Resolution,
) -> anyhow::Result<Vec<RawDetection>> {
    let num_anchors = anchors.len();
    anyhow::ensure!(
        boxes.rank() >= 2 && boxes.shape()[boxes.rank() - 2] == num_anchors,
        "unexpected box tensor shape {:?} for {} anchors",
        boxes.shape(),
        num_anchors,
    );

    let box_data = boxes.as_slice();
    let score_data = scores.as_slice();
    let landmark_data = landmarks.as_slice();

    let score_stride = score_data.len() / num_anchors;
    let box_stride = box_data.len() / num_anchors;
    let landmark_stride = landmark_data.len() / num_anchors;
    anyhow::ensure!(box_stride == 4, "box tensor must have 4 values per anchor");
    anyhow::ensure!(landmark_stride == 10, "landmark tensor must have 10 values per anchor");

    let mut detections = Vec::new();
    for i in 0..num_anchors {
        let face_score = if score_stride == 1 {
            score_data[i]
        } else {
            // Two-class softmax output [background, face]; take the face logit/probability,
            // which is always the final entry for this network family.
            score_data[i * score_stride + score_stride - 1]
        };

        if face_score < RAW_CONFIDENCE_FLOOR {
            continue;
        }

        let anchor = anchors.get(i);
        let b = &box_data[i * box_stride..i * box_stride + 4];
        let cx = anchor.xc + b[0] * CENTER_VARIANCE * anchor.w;
        let cy = anchor.yc + b[1] * CENTER_VARIANCE * anchor.h;
        let w = anchor.w * (b[2] * SIZE_VARIANCE).exp();
        let h = anchor.h * (b[3] * SIZE_VARIANCE).exp();

        let px_w = w * input_res.width() as f32;
        let px_h = h * input_res.height() as f32;
        if px_w < MIN_FACE_SIDE_PX || px_h < MIN_FACE_SIDE_PX {
            continue;
        }

        let l = &landmark_data[i * landmark_stride..i * landmark_stride + 10];
        let mut keypoints = Vec::with_capacity(5);
        for p in 0..5 {
            let lx = (anchor.xc + l[p * 2] * CENTER_VARIANCE * anchor.w).clamp(0.0, 1.0);
            let ly = (anchor.yc + l[p * 2 + 1] * CENTER_VARIANCE * anchor.h).clamp(0.0, 1.0);
            keypoints.push(Keypoint::new(lx, ly));
        }

        let rect = BoundingRect::from_center(cx.clamp(0.0, 1.0), cy.clamp(0.0, 1.0), w.max(0.0), h.max(0.0));
        detections.push(RawDetection::with_keypoints(face_score, rect, keypoints));
    }

    Ok(detections)
}

/// Maps a raw, letterboxed-frame-normalised detection back to source-image pixel coordinates.
fn to_detection(
    raw: RawDetection,
    input_res: Resolution,
    content_rect: &Rect,
    source_res: Resolution,
) -> Option<Detection> {
    let scale_x = content_rect.width() as f32 / source_res.width() as f32;
    let scale_y = content_rect.height() as f32 / source_res.height() as f32;
    if scale_x <= 0.0 || scale_y <= 0.0 {
        return None;
    }

    let unletterbox = |x_norm: f32, y_norm: f32| -> Point2D {
        let x_px = x_norm * input_res.width() as f32;
        let y_px = y_norm * input_res.height() as f32;
        Point2D::new(
            (x_px - content_rect.x() as f32) / scale_x,
            (y_px - content_rect.y() as f32) / scale_y,
        )
    };

    let bb = raw.bounding_rect();
    let top_left = unletterbox(bb.xc - bb.w / 2.0, bb.yc - bb.h / 2.0);
    let bottom_right = unletterbox(bb.xc + bb.w / 2.0, bb.yc + bb.h / 2.0);
    let rect = Rect::from_top_left(
        top_left.x.round() as i32,
        top_left.y.round() as i32,
        (bottom_right.x - top_left.x).max(0.0).round() as u32,
        (bottom_right.y - top_left.y).max(0.0).round() as u32,
    );

    let mut landmarks = [Point2D::new(0.0, 0.0); 5];
    for (i, kp) in raw.keypoints().iter().enumerate().take(5) {
        landmarks[i] = unletterbox(kp.x(), kp.y());
    }

    Some(Detection {
        rect,
        confidence: raw.confidence(),
        landmarks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_mean_subtract_matches_expected_offsets() {
        let out = bgr_mean_subtract(Color::from_rgb8(123, 117, 104));
        assert!((out[0] - 0.0).abs() < 1e-4);
        assert!((out[1] - 0.0).abs() < 1e-4);
        assert!((out[2] - 0.0).abs() < 1e-4);
    }
}
