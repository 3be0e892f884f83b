//! Error taxonomy for the scan pipeline.
//!
//! Most failures here are local to one pass and never abort it; callers
//! branch on the variant instead of propagating. Only asset failures during
//! construction (mask image, reference image) are fatal.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no current frame")]
    MissingFrame,

    #[error("{found} feature matches found, not enough for homography estimation")]
    InsufficientFeatureMatches { found: usize },

    #[error("homography warp failed validation")]
    BadHomography,

    #[error("recognizer '{recognizer}' failed: {reason}")]
    RecognizerFailure { recognizer: String, reason: String },

    #[error("failed to load reference model {path}: {reason}")]
    ModelLoadFailure { path: PathBuf, reason: String },

    #[error("reference model version mismatch: found {found}, expected {expected}")]
    ModelVersionMismatch { found: u32, expected: u32 },

    #[error("asset not found: {path}")]
    MissingAsset { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl ScanError {
    /// Wraps an external recognizer error with the recognizer's name.
    pub fn recognizer(recognizer: &str, err: impl std::fmt::Display) -> Self {
        ScanError::RecognizerFailure {
            recognizer: recognizer.to_string(),
            reason: err.to_string(),
        }
    }

    /// Returns true if a model rebuild can recover from this error.
    pub fn is_recoverable_by_rebuild(&self) -> bool {
        matches!(
            self,
            ScanError::ModelLoadFailure { .. }
                | ScanError::ModelVersionMismatch { .. }
                | ScanError::Io(_)
                | ScanError::Json(_)
        )
    }
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizer_error_names_recognizer() {
        let err = ScanError::recognizer("digits", "engine crashed");
        assert_eq!(
            err.to_string(),
            "recognizer 'digits' failed: engine crashed"
        );
    }

    #[test]
    fn test_rebuild_recoverable() {
        assert!(ScanError::ModelVersionMismatch { found: 1, expected: 2 }
            .is_recoverable_by_rebuild());
        assert!(!ScanError::MissingAsset {
            path: PathBuf::from("x.png")
        }
        .is_recoverable_by_rebuild());
        assert!(!ScanError::BadHomography.is_recoverable_by_rebuild());
    }
}
