//! Trait seams between the orchestrator and the two neural-network stages, so the pipeline can
//! be driven end-to-end in tests without loading real ONNX weights.

use std::time::Duration;

use pivcard_image::{Image, Rect};

use crate::detection::retinaface::Detection;
use crate::landmark::LandmarkResult;

pub trait FaceDetector {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>>;

    /// Named/elapsed snapshot of this stage's profiling timers, surfaced in
    /// [`crate::process::ProcessingResult::stage_timings`]. Empty by default; test doubles don't
    /// override it.
    fn stage_timings(&self) -> Vec<(&'static str, Duration)> {
        Vec::new()
    }
}

impl FaceDetector for crate::detection::retinaface::Detector {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        self.detect(image)
    }

    fn stage_timings(&self) -> Vec<(&'static str, Duration)> {
        self.timers().map(|t| (t.name(), t.last())).collect()
    }
}

pub trait LandmarkExtractor {
    fn compute(&mut self, image: &Image, face_rect: Rect) -> anyhow::Result<LandmarkResult>;

    fn stage_timings(&self) -> Vec<(&'static str, Duration)> {
        Vec::new()
    }
}

impl LandmarkExtractor for crate::landmark::Extractor {
    fn compute(&mut self, image: &Image, face_rect: Rect) -> anyhow::Result<LandmarkResult> {
        self.compute(image, face_rect)
    }

    fn stage_timings(&self) -> Vec<(&'static str, Duration)> {
        self.timers().map(|t| (t.name(), t.last())).collect()
    }
}

/// Test doubles for [`FaceDetector`] and [`LandmarkExtractor`], public so integration tests
/// outside this crate can drive the orchestrator without the real networks.
pub mod testing {
    use super::*;

    /// Always returns a fixed, caller-supplied set of detections.
    pub struct FakeFaceDetector {
        pub detections: Vec<Detection>,
    }

    impl FakeFaceDetector {
        pub fn single(detection: Detection) -> Self {
            Self { detections: vec![detection] }
        }

        pub fn none() -> Self {
            Self { detections: Vec::new() }
        }
    }

    impl FaceDetector for FakeFaceDetector {
        fn detect(&mut self, _image: &Image) -> anyhow::Result<Vec<Detection>> {
            Ok(self.detections.clone())
        }
    }

    /// Always returns a fixed, caller-supplied landmark set, ignoring the requested face rect.
    pub struct FakeLandmarkExtractor {
        pub landmarks: LandmarkResult,
    }

    impl LandmarkExtractor for FakeLandmarkExtractor {
        fn compute(&mut self, _image: &Image, _face_rect: Rect) -> anyhow::Result<LandmarkResult> {
            Ok(self.landmarks.clone())
        }
    }
}
