//! Pipeline error types.

use std::time::Duration;

use thiserror::Error;

/// Every way [`crate::process::process`] can fail.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no face was detected in the source image")]
    NoFaceDetected,

    #[error("{count} faces were detected but require_single_face is set")]
    MultipleFaces { count: usize },

    #[error("landmark extraction failed")]
    LandmarkExtractionFailed(#[source] anyhow::Error),

    #[error(transparent)]
    GeometryFailure(#[from] crate::geometry::GeometryError),

    #[error("JPEG 2000 encoding failed")]
    EncodingFailed(#[source] anyhow::Error),

    #[error("could not encode under the requested target size within the retry budget")]
    TargetSizeUnachievable(#[source] pivcard_jp2::StrategyError),

    #[error("processing exceeded its {0:?} timeout")]
    Timeout(Duration),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}
