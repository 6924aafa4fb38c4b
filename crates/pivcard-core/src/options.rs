//! Pipeline configuration: [`ProcessingOptions`] plus the named presets for PIV, TWIC, and
//! archival use.

use std::time::Duration;

pub use pivcard_jp2::EncodingStrategy;

/// Every knob the pipeline exposes. Construct via [`ProcessingOptions::default`] and override
/// individual fields, or start from one of the presets below (`piv_balanced`, `twic_max`,
/// `archival`).
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOptions {
    /// Minimum face-detector confidence, applied after the detector's own fixed internal floor.
    pub min_face_confidence: f32,
    /// If more than one face clears `min_face_confidence`, fail with
    /// [`crate::error::ProcessingError::MultipleFaces`] instead of picking the best one.
    pub require_single_face: bool,
    /// Additional JPEG 2000 encode attempts [`EncodingStrategy::TargetSize`] may make beyond the
    /// first.
    pub max_retries: u32,
    /// Wall-clock budget for the whole pipeline run, checked at each suspension point.
    pub processing_timeout: Duration,
    /// Whether to carry the source image's metadata through to the output. Currently a no-op
    /// placeholder: see `DESIGN.md`.
    pub preserve_metadata: bool,
    /// Resolution level, 0-3, above which the ROI's maxshift priority stops applying.
    pub roi_start_level: u8,
    pub enable_roi: bool,
    pub align_roi: bool,
    pub max_rotation_degrees: f32,
    pub strategy: EncodingStrategy,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            min_face_confidence: 0.8,
            require_single_face: true,
            max_retries: 2,
            processing_timeout: Duration::from_secs(30),
            preserve_metadata: false,
            roi_start_level: 3,
            enable_roi: true,
            align_roi: false,
            max_rotation_degrees: 15.0,
            strategy: EncodingStrategy::FixedRate { rate: 0.7 },
        }
    }
}

impl ProcessingOptions {
    pub fn validate(&self) -> Result<(), crate::error::ProcessingError> {
        use crate::error::ProcessingError;

        if !(0.0..=1.0).contains(&self.min_face_confidence) {
            return Err(ProcessingError::InvalidInput(format!(
                "min_face_confidence must be in [0, 1], got {}",
                self.min_face_confidence
            )));
        }
        if self.roi_start_level > 3 {
            return Err(ProcessingError::InvalidInput(format!(
                "roi_start_level must be in [0, 3], got {}",
                self.roi_start_level
            )));
        }
        if !(0.0..=45.0).contains(&self.max_rotation_degrees) {
            return Err(ProcessingError::InvalidInput(format!(
                "max_rotation_degrees must be in [0, 45], got {}",
                self.max_rotation_degrees
            )));
        }
        Ok(())
    }
}

/// PIV-balanced preset: targets the 20,000-byte budget common to PIV card applets.
pub fn piv_balanced() -> ProcessingOptions {
    ProcessingOptions {
        strategy: EncodingStrategy::TargetSize { target_bytes: 20_000 },
        ..ProcessingOptions::default()
    }
}

/// TWIC preset: targets TWIC's tighter 14,000-byte applet budget.
pub fn twic_max() -> ProcessingOptions {
    ProcessingOptions {
        strategy: EncodingStrategy::TargetSize { target_bytes: 14_000 },
        ..ProcessingOptions::default()
    }
}

/// Archival preset: a fixed, high-quality rate with a stricter confidence floor, for records that
/// are never written to a constrained-size applet.
pub fn archival() -> ProcessingOptions {
    ProcessingOptions {
        strategy: EncodingStrategy::FixedRate { rate: 4.0 },
        min_face_confidence: 0.9,
        ..ProcessingOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(ProcessingOptions::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let options = ProcessingOptions { min_face_confidence: 1.5, ..ProcessingOptions::default() };
        assert!(options.validate().is_err());
    }

    #[test]
    fn out_of_range_max_rotation_is_rejected() {
        let options = ProcessingOptions { max_rotation_degrees: 90.0, ..ProcessingOptions::default() };
        assert!(options.validate().is_err());
    }

    #[test]
    fn presets_validate() {
        assert!(piv_balanced().validate().is_ok());
        assert!(twic_max().validate().is_ok());
        assert!(archival().validate().is_ok());
    }
}
