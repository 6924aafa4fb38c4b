//! End-to-end orchestrator scenarios, driven through the [`pivcard_core::traits::testing`] fakes
//! where the scenario only exercises the pipeline's decision logic, and through the real
//! [`pivcard_core::process`] entry point for scenarios that depend on nothing past input decoding.

use pivcard_core::detection::retinaface::Detection;
use pivcard_core::landmark::LandmarkResult;
use pivcard_core::process::run_pipeline;
use pivcard_core::traits::testing::{FakeFaceDetector, FakeLandmarkExtractor};
use pivcard_core::{process, ProcessingOptions, ProcessingError};
use pivcard_image::{Color, Image, Point2D, Rect};

fn source_photo() -> Vec<u8> {
    let mut image = Image::new(1200, 1600);
    image.clear(Color::from_rgb8(200, 200, 200));
    let path = std::env::temp_dir().join(format!("pivcard-core-e2e-{}-{}.jpg", std::process::id(), line!()));
    image.save(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    bytes
}

/// Upright jaw/eye landmarks centered at `(center_x, center_y)`, large enough to clear the
/// minimum crop size so the pipeline runs all the way through to encoding.
fn upright_landmarks(center_x: f32, center_y: f32) -> LandmarkResult {
    let mut points = [Point2D::new(0.0, 0.0); 68];
    for (i, p) in points[0..=16].iter_mut().enumerate() {
        let t = i as f32 / 16.0;
        *p = Point2D::new(center_x - 110.0 + t * 220.0, center_y + 150.0);
    }
    for p in &mut points[36..=41] {
        *p = Point2D::new(center_x - 40.0, center_y);
    }
    for p in &mut points[42..=47] {
        *p = Point2D::new(center_x + 40.0, center_y);
    }
    LandmarkResult::new(points)
}

/// Scenario 5 (spec.md §8): two faces clear the confidence floor. With
/// `require_single_face: true` (the default), the run fails with `MultipleFaces`.
#[test]
fn two_confident_faces_with_require_single_face_reports_multiple_faces() {
    let low_confidence = Detection::new(Rect::from_top_left(100, 100, 400, 500), 0.91, [Point2D::new(0.0, 0.0); 5]);
    let higher_confidence = Detection::new(Rect::from_top_left(600, 600, 400, 500), 0.97, [Point2D::new(0.0, 0.0); 5]);
    let mut detector = FakeFaceDetector { detections: vec![low_confidence, higher_confidence] };
    let mut extractor = FakeLandmarkExtractor { landmarks: upright_landmarks(700.0, 800.0) };

    let options = ProcessingOptions { require_single_face: true, ..ProcessingOptions::default() };
    let err = run_pipeline(&source_photo(), &options, &mut detector, &mut extractor).unwrap_err();

    assert!(matches!(err, ProcessingError::MultipleFaces { count: 2 }));
}

/// Scenario 5 (spec.md §8), second half: the same two faces, but with
/// `require_single_face: false`, the run succeeds and uses the higher-confidence face.
#[test]
fn two_confident_faces_without_require_single_face_uses_the_higher_confidence_one() {
    let low_confidence = Detection::new(Rect::from_top_left(100, 100, 400, 500), 0.91, [Point2D::new(0.0, 0.0); 5]);
    let higher_confidence = Detection::new(Rect::from_top_left(600, 600, 400, 500), 0.97, [Point2D::new(0.0, 0.0); 5]);
    let mut detector = FakeFaceDetector { detections: vec![low_confidence, higher_confidence] };
    let mut extractor = FakeLandmarkExtractor { landmarks: upright_landmarks(700.0, 800.0) };

    let options = ProcessingOptions { require_single_face: false, ..ProcessingOptions::default() };
    let result = run_pipeline(&source_photo(), &options, &mut detector, &mut extractor).unwrap();

    assert_eq!(result.face_confidence, 0.97);
}

/// Scenario 6 (spec.md §8): 6 bytes of non-image data fail at input decoding, before any face
/// detector or landmark extractor is ever touched.
#[test]
fn six_bytes_of_non_image_data_reports_invalid_input() {
    let garbage = [0u8, 1, 2, 3, 4, 5];
    let err = process(&garbage, &ProcessingOptions::default()).unwrap_err();
    assert!(matches!(err, ProcessingError::InvalidInput(_)));
}
