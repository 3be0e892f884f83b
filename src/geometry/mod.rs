//! Capture geometry correction.
//!
//! This module provides:
//! - Offset, letterbox and perspective hypotheses scored against the mask
//! - ORB-style keypoints and descriptor matching
//! - Homography estimation with RANSAC
//! - The cached reference feature model

pub mod calibrator;
pub mod correction;
pub mod features;
pub mod homography;
pub mod model;

pub use calibrator::{CalibrationOutcome, Calibrator};
pub use correction::{select_best, Corrector, Hypothesis};
pub use homography::Homography;
pub use model::ReferenceModel;
