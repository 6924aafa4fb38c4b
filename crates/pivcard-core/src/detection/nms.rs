//! Non-maximum suppression over raw detector output.

use super::RawDetection;

/// How overlapping detections are resolved once one of them is picked as the local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Simply discard every detection overlapping the maximum above the IoU threshold.
    Remove,
    /// Merge overlapping detections into the maximum by confidence-weighted averaging of their
    /// bounding rects and keypoints, instead of discarding them outright.
    Average,
}

/// Greedy non-maximum suppression, run once per detector invocation.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
    avg_buf: Vec<RawDetection>,
    out_buf: Vec<RawDetection>,
}

impl NonMaxSuppression {
    pub fn new(iou_thresh: f32, mode: SuppressionMode) -> Self {
        Self {
            iou_thresh,
            mode,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
        }
    }

    /// Runs suppression over `detections`, consuming it and returning the surviving set, ordered
    /// from highest to lowest confidence.
    pub fn process(&mut self, mut detections: Vec<RawDetection>) -> Vec<RawDetection> {
        self.out_buf.clear();
        detections.sort_by(|a, b| a.confidence().partial_cmp(&b.confidence()).unwrap());

        while let Some(max) = detections.pop() {
            self.avg_buf.clear();
            self.avg_buf.push(max.clone());

            detections.retain(|det| {
                if det.bounding_rect().iou(&self.avg_buf[0].bounding_rect()) > self.iou_thresh {
                    self.avg_buf.push(det.clone());
                    false
                } else {
                    true
                }
            });

            let merged = match self.mode {
                SuppressionMode::Remove => self.avg_buf[0].clone(),
                SuppressionMode::Average => average(&self.avg_buf),
            };
            self.out_buf.push(merged);
        }

        std::mem::take(&mut self.out_buf)
    }
}

fn average(dets: &[RawDetection]) -> RawDetection {
    let total_conf: f32 = dets.iter().map(RawDetection::confidence).sum();
    let weight = |c: f32| if total_conf > 0.0 { c / total_conf } else { 1.0 / dets.len() as f32 };

    let mut xc = 0.0;
    let mut yc = 0.0;
    let mut w = 0.0;
    let mut h = 0.0;
    for det in dets {
        let rect = det.bounding_rect();
        let wt = weight(det.confidence());
        xc += rect.xc * wt;
        yc += rect.yc * wt;
        w += rect.w * wt;
        h += rect.h * wt;
    }

    let rect = super::BoundingRect::from_center(xc, yc, w, h);
    let max_conf = dets.iter().map(RawDetection::confidence).fold(0.0_f32, f32::max);
    let best = dets
        .iter()
        .max_by(|a, b| a.confidence().partial_cmp(&b.confidence()).unwrap())
        .expect("avg_buf is never empty");

    RawDetection::with_keypoints(max_conf, rect, best.keypoints().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingRect;

    fn det(conf: f32, xc: f32, yc: f32, w: f32, h: f32) -> RawDetection {
        RawDetection::new(conf, BoundingRect::from_center(xc, yc, w, h))
    }

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new(0.4, SuppressionMode::Remove);
        let dets = vec![det(0.9, 0.5, 0.5, 0.2, 0.2), det(0.6, 0.51, 0.51, 0.2, 0.2)];
        let result = nms.process(dets);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].confidence(), 0.9);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new(0.4, SuppressionMode::Remove);
        let dets = vec![det(0.9, 0.1, 0.1, 0.1, 0.1), det(0.6, 0.9, 0.9, 0.1, 0.1)];
        let result = nms.process(dets);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn nms_averages_detections() {
        let mut nms = NonMaxSuppression::new(0.4, SuppressionMode::Average);
        let dets = vec![det(0.5, 0.0, 0.0, 0.2, 0.2), det(0.5, 0.02, 0.0, 0.2, 0.2)];
        let result = nms.process(dets);
        assert_eq!(result.len(), 1);
        assert!((result[0].bounding_rect().xc - 0.01).abs() < 1e-5);
    }
}
