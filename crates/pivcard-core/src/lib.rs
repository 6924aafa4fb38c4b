//! Facial-photo to PIV/TWIC JPEG 2000 credential-image pipeline.
//!
//! [`process`] (and its narrower siblings `process_for_piv`/`process_for_twic`) take a decodable
//! source photo and produce a standards-compliant 420x560 JPEG 2000 credential image: detect the
//! subject's face, extract 68 facial landmarks, level and crop the image per INCITS 385-2004
//! §B.2.1, validate the result against the PIV compliance thresholds, and encode it with an inner
//! region of interest prioritised for quality.

pub mod compliance;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod landmark;
pub mod models;
pub mod options;
pub mod process;
pub mod roi;
pub mod traits;

pub use compliance::{ComplianceReport, Severity};
pub use error::ProcessingError;
pub use options::ProcessingOptions;
pub use process::{process, process_for_piv, process_for_twic, process_to_size, process_with_rate, try_process, ProcessingResult};
pub use roi::RoiSet;
