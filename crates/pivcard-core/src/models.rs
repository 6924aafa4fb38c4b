//! Embedded network weights.
//!
//! The weight files under `3rdparty/onnx` are placeholders in this tree; swap them for trained
//! RetinaFace/PFLD exports before shipping, the loader code does not change.

use pivcard_nn::NeuralNetwork;

use crate::detection::retinaface::Detector as FaceDetector;
use crate::landmark::Extractor as LandmarkExtractor;

static FACE_DETECTOR_WEIGHTS: &[u8] = include_blob::include_bytes!("3rdparty/onnx/face_detector.onnx");
static LANDMARK_WEIGHTS: &[u8] = include_blob::include_bytes!("3rdparty/onnx/landmark.onnx");

/// Loads the embedded face detection network.
pub fn load_face_detector() -> anyhow::Result<FaceDetector> {
    let nn = NeuralNetwork::from_onnx(FACE_DETECTOR_WEIGHTS)?.load()?;
    FaceDetector::new(nn)
}

/// Loads the embedded landmark extraction network.
pub fn load_landmark_extractor() -> anyhow::Result<LandmarkExtractor> {
    let nn = NeuralNetwork::from_onnx(LANDMARK_WEIGHTS)?.load()?;
    LandmarkExtractor::new(nn)
}
