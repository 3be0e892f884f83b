//! Reference feature model for the canonical scoreboard.
//!
//! The model is derived from a bundled reference image through exactly the
//! same preprocessing used on live frames, and cached on disk as JSON. A
//! missing, corrupt or outdated cache is rebuilt transparently.

use image::{GrayImage, Luma, RgbImage};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ScanError, ScanResult};
use crate::filters::{is_dark, is_white};
use crate::geometry::features::{detect_and_describe, DetectorParams, FeatureSet};
use crate::layout::{CANONICAL_HEIGHT, CANONICAL_WIDTH, GLARE_BAND_LEFT, UNSTABLE_REGION_RIGHT};

/// Bumped whenever the feature pipeline changes.
pub const MODEL_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceModel {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub features: FeatureSet,
}

/// Builds the feature-emphasis image of a frame.
///
/// The left part of the screen animates and is blanked. Elsewhere dark
/// pixels become black and everything else white, except in the glare band
/// on the right where white pixels are also suppressed.
pub fn feature_image(frame: &RgbImage) -> GrayImage {
    let (w, h) = frame.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        if x < UNSTABLE_REGION_RIGHT {
            return Luma([0]);
        }
        let p = frame.get_pixel(x, y);
        let inv_dark: u8 = if is_dark(p) { 0 } else { 255 };
        let white: u8 = if is_white(p) { 255 } else { 0 };
        let v = if x >= GLARE_BAND_LEFT {
            inv_dark.saturating_sub(white)
        } else {
            inv_dark.saturating_add(white)
        };
        Luma([v])
    })
}

/// Feature extraction shared by model building and live calibration.
pub fn extract_features(frame: &RgbImage) -> FeatureSet {
    detect_and_describe(&feature_image(frame), &DetectorParams::default())
}

impl ReferenceModel {
    /// Builds the model from a reference image.
    pub fn build(reference: &RgbImage) -> Self {
        let features = extract_features(reference);
        info!("Reference model built with {} keypoints", features.len());
        Self {
            version: MODEL_VERSION,
            width: reference.width(),
            height: reference.height(),
            features,
        }
    }

    pub fn save(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Loads and validates a cached model.
    pub fn load(path: &Path) -> ScanResult<Self> {
        let contents = fs::read_to_string(path)?;
        let model: ReferenceModel = serde_json::from_str(&contents)?;

        if model.version != MODEL_VERSION {
            return Err(ScanError::ModelVersionMismatch {
                found: model.version,
                expected: MODEL_VERSION,
            });
        }
        if (model.width, model.height) != (CANONICAL_WIDTH, CANONICAL_HEIGHT) {
            return Err(ScanError::ModelLoadFailure {
                path: path.to_path_buf(),
                reason: format!("unexpected geometry {}x{}", model.width, model.height),
            });
        }
        if model.features.keypoints.len() != model.features.descriptors.len() {
            return Err(ScanError::ModelLoadFailure {
                path: path.to_path_buf(),
                reason: "keypoints and descriptors are not aligned".to_string(),
            });
        }
        Ok(model)
    }

    /// Loads the cached model, rebuilding it from `reference_image` when the
    /// cache is unusable. Only a missing reference image is fatal.
    pub fn load_or_rebuild(model_path: &Path, reference_image: &Path) -> ScanResult<Self> {
        match Self::load(model_path) {
            Ok(model) => {
                info!(
                    "Reference model loaded from {} ({} keypoints)",
                    model_path.display(),
                    model.features.len()
                );
                return Ok(model);
            }
            Err(e) if e.is_recoverable_by_rebuild() => {
                warn!("Reference model unusable ({}), rebuilding", e);
            }
            Err(e) => return Err(e),
        }

        Self::rebuild(model_path, reference_image)?;
        Self::load(model_path)
    }

    /// Rebuilds the model from the reference image and writes it to disk.
    pub fn rebuild(model_path: &Path, reference_image: &Path) -> ScanResult<Self> {
        if !reference_image.exists() {
            return Err(ScanError::ModelLoadFailure {
                path: reference_image.to_path_buf(),
                reason: "reference image not found".to_string(),
            });
        }
        let reference = image::open(reference_image)?.to_rgb8();
        let reference = if (reference.width(), reference.height()) == (CANONICAL_WIDTH, CANONICAL_HEIGHT) {
            reference
        } else {
            image::imageops::resize(
                &reference,
                CANONICAL_WIDTH,
                CANONICAL_HEIGHT,
                image::imageops::FilterType::Triangle,
            )
        };

        let model = Self::build(&reference);
        model.save(model_path)?;
        info!("Reference model saved to {}", model_path.display());
        Ok(model)
    }
}
