//! The orchestrator: wires detection, landmark extraction, geometry, compliance, ROI, and JPEG
//! 2000 encoding into a single end-to-end run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pivcard_image::{Image, Resolution};
use pivcard_jp2::{Attempt, RoiParams};
use pivcard_utils::timer::Deadline;

use crate::compliance::ComplianceReport;
use crate::error::ProcessingError;
use crate::geometry::{self, RotationAngle};
use crate::models;
use crate::options::ProcessingOptions;
use crate::roi::RoiSet;
use crate::traits::{FaceDetector, LandmarkExtractor};

/// MIME type of [`ProcessingResult::jp2_bytes`], per §3 of the data model.
pub const OUTPUT_MIME_TYPE: &str = "image/jp2";

/// Everything produced by a successful pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub jp2_bytes: Vec<u8>,
    /// Always `"image/jp2"`.
    pub mime_type: &'static str,
    /// Always 420x560, per §4.A's output frame.
    pub dimensions: Resolution,
    pub compliance: ComplianceReport,
    pub roi: RoiSet,
    pub rotation_degrees: f32,
    /// Confidence of the face the pipeline selected and encoded.
    pub face_confidence: f32,
    /// The bits/pixel rate of the encode attempt that was actually kept.
    pub compression_rate: f32,
    /// The target size requested, when `options.strategy` was [`pivcard_jp2::EncodingStrategy::TargetSize`].
    pub target_bytes: Option<u32>,
    /// Wall-clock time spent in [`run_pipeline`], start to finish.
    pub processing_duration: Duration,
    /// Non-fatal compliance findings, mirrored from [`ComplianceReport::issues`] for callers who
    /// only care about warnings and not the full report.
    pub warnings: Vec<String>,
    /// Per-stage profiling timings (detector/extractor resize, infer, etc.), formatted as
    /// `"<elapsed> ms"` strings for easy display or logging.
    pub additional_data: HashMap<String, String>,
    pub encode_attempts: Vec<Attempt>,
}

/// Runs the full pipeline against already-loaded face detector and landmark extractor instances.
///
/// This is the seam integration tests drive with [`crate::traits::testing`] fakes; [`process`]
/// and [`try_process`] are thin convenience wrappers that load the real networks.
pub fn run_pipeline(
    input: &[u8],
    options: &ProcessingOptions,
    detector: &mut dyn FaceDetector,
    extractor: &mut dyn LandmarkExtractor,
) -> Result<ProcessingResult, ProcessingError> {
    let started = Instant::now();
    options.validate()?;
    let deadline = Deadline::after(options.processing_timeout);

    let image = Image::decode_jpeg(input)
        .map_err(|e| ProcessingError::InvalidInput(format!("could not decode source image: {e}")))?;

    check_deadline(&deadline, options)?;
    let mut detections = detector
        .detect(&image)
        .map_err(|e| ProcessingError::Internal(e.context("face detection failed")))?;
    detections.retain(|d| d.confidence() >= options.min_face_confidence);
    detections.sort_by(|a, b| b.confidence().partial_cmp(&a.confidence()).unwrap());

    if detections.is_empty() {
        return Err(ProcessingError::NoFaceDetected);
    }
    if options.require_single_face && detections.len() > 1 {
        return Err(ProcessingError::MultipleFaces { count: detections.len() });
    }
    let face = &detections[0];
    let face_confidence = face.confidence();

    check_deadline(&deadline, options)?;
    let landmarks = extractor
        .compute(&image, face.bounding_rect())
        .map_err(ProcessingError::LandmarkExtractionFailed)?;

    let rotation = RotationAngle::from_eyes(landmarks.left_eye_center(), landmarks.right_eye_center(), options.max_rotation_degrees);
    let rotated_image = geometry::rotate_image(&image, rotation);
    let rotated_landmarks = geometry::rotate_landmarks(&landmarks, image.resolution(), rotation);

    let crop = geometry::compute_crop(&rotated_landmarks, rotated_image.resolution())?;
    let output_image = geometry::crop_and_resize(&rotated_image, &crop.rect);
    let final_landmarks = geometry::reproject_landmarks(&rotated_landmarks, &crop.rect);

    let roi = RoiSet::build();
    let compliance = ComplianceReport::evaluate(&final_landmarks, rotation.was_clamped());

    let roi_params = options.enable_roi.then(|| RoiParams {
        rect: roi.inner_region().rect,
        start_level: options.roi_start_level,
        align: options.align_roi,
    });

    check_deadline(&deadline, options)?;
    let outcome = pivcard_jp2::encode(&output_image, options.strategy, options.max_retries, roi_params).map_err(|e| {
        match e.downcast::<pivcard_jp2::StrategyError>() {
            Ok(strategy_err) => ProcessingError::TargetSizeUnachievable(strategy_err),
            Err(e) => ProcessingError::EncodingFailed(e),
        }
    })?;

    if deadline.is_expired() {
        return Err(ProcessingError::Timeout(options.processing_timeout));
    }

    let compression_rate = outcome.attempts.last().map(|a| a.rate).unwrap_or(0.0);
    let target_bytes = match options.strategy {
        pivcard_jp2::EncodingStrategy::TargetSize { target_bytes } => Some(target_bytes),
        pivcard_jp2::EncodingStrategy::FixedRate { .. } => None,
    };
    let warnings = compliance.issues.clone();

    let mut additional_data = HashMap::new();
    for (name, elapsed) in detector.stage_timings().into_iter().chain(extractor.stage_timings()) {
        additional_data.insert(format!("timing.{name}"), format!("{:.3} ms", elapsed.as_secs_f64() * 1000.0));
    }

    Ok(ProcessingResult {
        jp2_bytes: outcome.bytes,
        mime_type: OUTPUT_MIME_TYPE,
        dimensions: Resolution::new(geometry::OUTPUT_WIDTH, geometry::OUTPUT_HEIGHT),
        compliance,
        roi,
        rotation_degrees: rotation.degrees(),
        face_confidence,
        compression_rate,
        target_bytes,
        processing_duration: started.elapsed(),
        warnings,
        additional_data,
        encode_attempts: outcome.attempts,
    })
}

fn check_deadline(deadline: &Deadline, options: &ProcessingOptions) -> Result<(), ProcessingError> {
    if deadline.is_expired() {
        Err(ProcessingError::Timeout(options.processing_timeout))
    } else {
        Ok(())
    }
}

/// Loads the production face detector and landmark extractor and runs the full pipeline.
///
/// This is the "full control" entry point: failures are reported as a typed [`ProcessingError`].
/// Callers that want a non-throwing result triple instead should use [`try_process`].
pub fn process(input: &[u8], options: &ProcessingOptions) -> Result<ProcessingResult, ProcessingError> {
    options.validate()?;
    Image::decode_jpeg(input).map_err(|e| ProcessingError::InvalidInput(format!("could not decode source image: {e}")))?;

    let mut detector = models::load_face_detector().map_err(ProcessingError::Internal)?;
    let mut extractor = models::load_landmark_extractor().map_err(ProcessingError::Internal)?;
    run_pipeline(input, options, &mut detector, &mut extractor)
}

/// Non-throwing wrapper around [`process`].
///
/// Never returns an `Err`: a successful run is `(true, Some(result), None)`, a failed one is
/// `(false, None, Some(message))`, per the try-pattern described in spec.md §6/§7. Prefer
/// [`process`] when the caller wants to match on the specific [`ProcessingError`] variant.
pub fn try_process(input: &[u8], options: &ProcessingOptions) -> (bool, Option<ProcessingResult>, Option<String>) {
    to_triple(process(input, options))
}

fn to_triple(result: Result<ProcessingResult, ProcessingError>) -> (bool, Option<ProcessingResult>, Option<String>) {
    match result {
        Ok(result) => (true, Some(result), None),
        Err(e) => (false, None, Some(e.to_string())),
    }
}

pub fn process_for_piv(input: &[u8]) -> Result<ProcessingResult, ProcessingError> {
    process(input, &crate::options::piv_balanced())
}

pub fn process_for_twic(input: &[u8]) -> Result<ProcessingResult, ProcessingError> {
    process(input, &crate::options::twic_max())
}

pub fn process_to_size(input: &[u8], target_bytes: u32) -> Result<ProcessingResult, ProcessingError> {
    let options = ProcessingOptions {
        strategy: pivcard_jp2::EncodingStrategy::TargetSize { target_bytes },
        ..ProcessingOptions::default()
    };
    process(input, &options)
}

pub fn process_with_rate(input: &[u8], rate: f32) -> Result<ProcessingResult, ProcessingError> {
    let options = ProcessingOptions {
        strategy: pivcard_jp2::EncodingStrategy::FixedRate { rate },
        ..ProcessingOptions::default()
    };
    process(input, &options)
}

#[cfg(test)]
mod tests {
    use pivcard_image::{Color, Point2D, Rect};

    use super::*;
    use crate::detection::retinaface::Detection;
    use crate::landmark::LandmarkResult;
    use crate::traits::testing::{FakeFaceDetector, FakeLandmarkExtractor};

    fn test_image() -> Vec<u8> {
        let mut image = Image::new(1200, 1600);
        image.clear(Color::from_rgb8(200, 200, 200));
        let path = std::env::temp_dir().join(format!("pivcard-core-test-{}.jpg", std::process::id()));
        image.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        bytes
    }

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

    #[test]
    fn no_detections_reports_no_face_detected() {
        let mut detector = FakeFaceDetector::none();
        let mut extractor = FakeLandmarkExtractor { landmarks: upright_landmarks(600.0, 700.0) };
        let err = run_pipeline(&test_image(), &ProcessingOptions::default(), &mut detector, &mut extractor).unwrap_err();
        assert!(matches!(err, ProcessingError::NoFaceDetected));
    }

    #[test]
    fn low_confidence_detection_is_filtered_out_as_no_face() {
        let detection = Detection::new(
            Rect::from_top_left(400, 400, 400, 500),
            0.5,
            [Point2D::new(0.0, 0.0); 5],
        );
        let mut detector = FakeFaceDetector::single(detection);
        let mut extractor = FakeLandmarkExtractor { landmarks: upright_landmarks(600.0, 700.0) };
        let err = run_pipeline(&test_image(), &ProcessingOptions::default(), &mut detector, &mut extractor).unwrap_err();
        assert!(matches!(err, ProcessingError::NoFaceDetected));
    }

    #[test]
    fn tiny_face_rejects_with_geometry_failure() {
        let detection = Detection::new(Rect::from_top_left(0, 0, 10, 10), 0.95, [Point2D::new(0.0, 0.0); 5]);
        let mut detector = FakeFaceDetector::single(detection);
        let mut extractor = FakeLandmarkExtractor {
            landmarks: {
                let mut points = [Point2D::new(1.0, 1.0); 68];
                for p in &mut points[0..=16] {
                    *p = Point2D::new(1.0, 1.0);
                }
                LandmarkResult::new(points)
            },
        };
        let err = run_pipeline(&test_image(), &ProcessingOptions::default(), &mut detector, &mut extractor).unwrap_err();
        assert!(matches!(err, ProcessingError::GeometryFailure(_)));
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let detection = Detection::new(Rect::from_top_left(400, 400, 400, 500), 0.95, [Point2D::new(0.0, 0.0); 5]);
        let mut detector = FakeFaceDetector::single(detection);
        let mut extractor = FakeLandmarkExtractor { landmarks: upright_landmarks(600.0, 700.0) };
        let options = ProcessingOptions { processing_timeout: std::time::Duration::ZERO, ..ProcessingOptions::default() };
        std::thread::sleep(std::time::Duration::from_millis(2));
        let err = run_pipeline(&test_image(), &options, &mut detector, &mut extractor).unwrap_err();
        assert!(matches!(err, ProcessingError::Timeout(_)));
    }

    #[test]
    fn try_process_wraps_an_error_result_as_a_false_none_message_triple() {
        let err = ProcessingError::NoFaceDetected;
        let (ok, result, message) = to_triple(Err(err));
        assert!(!ok);
        assert!(result.is_none());
        assert_eq!(message.as_deref(), Some("no face was detected in the source image"));
    }

    #[test]
    fn try_process_wraps_an_ok_result_as_a_true_some_none_triple() {
        let detection = Detection::new(Rect::from_top_left(400, 400, 400, 500), 0.95, [Point2D::new(0.0, 0.0); 5]);
        let mut detector = FakeFaceDetector::single(detection);
        let mut extractor = FakeLandmarkExtractor { landmarks: upright_landmarks(600.0, 700.0) };
        let result = run_pipeline(&test_image(), &ProcessingOptions::default(), &mut detector, &mut extractor);
        let (ok, result, message) = to_triple(result);
        assert!(ok);
        assert!(result.is_some());
        assert!(message.is_none());
    }
}
