//! Perspective correction against the reference feature model.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use log::debug;

use crate::error::{ScanError, ScanResult};
use crate::geometry::features::match_descriptors;
use crate::geometry::homography::{fit_ransac, Homography, RansacParams};
use crate::geometry::model::{extract_features, ReferenceModel};
use crate::layout::{CANONICAL_HEIGHT, CANONICAL_WIDTH};
use crate::matcher::ScoreboardMask;

/// Lowe ratio for descriptor matching.
pub const MATCH_RATIO: f32 = 0.75;
pub const MIN_MATCHES: usize = 4;

/// What a calibration attempt produced.
#[derive(Clone, Debug)]
pub enum CalibrationOutcome {
    /// Frame warped to canonical geometry and confirmed by the coarse match.
    Warped(RgbImage),
    InsufficientMatches { found: usize },
    /// No homography could be fitted to the matches.
    NoHomography,
    /// The warp was computed but did not look like a scoreboard.
    BadHomography,
}

impl std::fmt::Display for CalibrationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationOutcome::Warped(_) => write!(f, "warped"),
            CalibrationOutcome::InsufficientMatches { found } => {
                write!(f, "only {} feature matches", found)
            }
            CalibrationOutcome::NoHomography => write!(f, "no homography fits the matches"),
            CalibrationOutcome::BadHomography => write!(f, "warp failed validation"),
        }
    }
}

pub struct Calibrator {
    model: ReferenceModel,
    mask: ScoreboardMask,
    ransac: RansacParams,
}

impl Calibrator {
    pub fn new(model: ReferenceModel, mask: ScoreboardMask) -> Self {
        Self {
            model,
            mask,
            ransac: RansacParams::default(),
        }
    }

    /// Estimates the homography mapping reference coordinates to frame
    /// coordinates.
    pub fn estimate(&self, frame: &RgbImage) -> ScanResult<Homography> {
        let live = extract_features(frame);
        let matches = match_descriptors(
            &live.descriptors,
            &self.model.features.descriptors,
            MATCH_RATIO,
        );
        debug!(
            "Calibration: {} live keypoints, {} matches",
            live.len(),
            matches.len()
        );
        if matches.len() < MIN_MATCHES {
            return Err(ScanError::InsufficientFeatureMatches {
                found: matches.len(),
            });
        }

        let src: Vec<[f64; 2]> = matches
            .iter()
            .map(|m| {
                let k = self.model.features.keypoints[m.train_idx];
                [k.x as f64, k.y as f64]
            })
            .collect();
        let dst: Vec<[f64; 2]> = matches
            .iter()
            .map(|m| {
                let k = live.keypoints[m.query_idx];
                [k.x as f64, k.y as f64]
            })
            .collect();

        let fit = fit_ransac(&src, &dst, &self.ransac).map_err(|e| {
            debug!("Calibration: RANSAC failed: {}", e);
            ScanError::BadHomography
        })?;
        debug!(
            "Calibration: {} of {} matches are inliers",
            fit.inlier_count,
            matches.len()
        );
        Ok(fit.homography)
    }

    /// Warps the frame back to canonical geometry and validates the result.
    pub fn calibrate(&self, frame: &RgbImage) -> CalibrationOutcome {
        let homography = match self.estimate(frame) {
            Ok(h) => h,
            Err(ScanError::InsufficientFeatureMatches { found }) => {
                return CalibrationOutcome::InsufficientMatches { found };
            }
            Err(_) => return CalibrationOutcome::NoHomography,
        };

        let Some(warped) = warp_to_canonical(frame, &homography) else {
            return CalibrationOutcome::NoHomography;
        };

        if self.mask.coarse_match(&warped) {
            CalibrationOutcome::Warped(warped)
        } else {
            debug!("Calibration: warped frame broke the image");
            CalibrationOutcome::BadHomography
        }
    }
}

/// Resamples `frame` so that canonical pixel `p` takes the value at
/// `ref_to_frame(p)`.
pub fn warp_to_canonical(frame: &RgbImage, ref_to_frame: &Homography) -> Option<RgbImage> {
    let frame_to_ref = ref_to_frame.inverse()?;
    let projection = Projection::from_matrix(frame_to_ref.to_row_major_f32())?;
    let mut out = RgbImage::new(CANONICAL_WIDTH, CANONICAL_HEIGHT);
    warp_into(
        frame,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut out,
    );
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{render_scoreboard, scoreboard_mask, ScoreboardSpec};

    fn calibrator() -> Calibrator {
        let reference = render_scoreboard(&ScoreboardSpec {
            obstacles: 40,
            ..Default::default()
        });
        Calibrator::new(ReferenceModel::build(&reference), scoreboard_mask())
    }

    fn shifted_frame() -> RgbImage {
        render_scoreboard(&ScoreboardSpec {
            obstacles: 40,
            offset: (5, 3),
            ..Default::default()
        })
    }

    #[test]
    fn test_estimate_recovers_translation() {
        let calibrator = calibrator();
        let frame = shifted_frame();

        let h = calibrator.estimate(&frame).unwrap();
        for (x, y) in [(800.0, 200.0), (1000.0, 400.0), (1200.0, 650.0)] {
            let (u, v) = h.project(x, y).unwrap();
            assert!((u - x - 5.0).abs() < 1.5, "x: {} -> {}", x, u);
            assert!((v - y - 3.0).abs() < 1.5, "y: {} -> {}", y, v);
        }
    }

    #[test]
    fn test_identity_warp_preserves_frame() {
        let frame = render_scoreboard(&ScoreboardSpec::default());
        let warped = warp_to_canonical(&frame, &Homography::identity()).unwrap();
        assert_eq!(warped.get_pixel(700, 60), frame.get_pixel(700, 60));
        assert_eq!(warped.get_pixel(100, 100), frame.get_pixel(100, 100));
    }

    #[test]
    fn test_featureless_frame_has_insufficient_matches() {
        let calibrator = calibrator();
        let blank = RgbImage::from_pixel(1280, 720, Rgb([70, 70, 90]));
        assert!(matches!(
            calibrator.calibrate(&blank),
            CalibrationOutcome::InsufficientMatches { found: 0 }
        ));
    }

    #[test]
    fn test_shifted_frame_is_warped_back() {
        let calibrator = calibrator();
        match calibrator.calibrate(&shifted_frame()) {
            CalibrationOutcome::Warped(warped) => {
                assert_eq!(warped.dimensions(), (CANONICAL_WIDTH, CANONICAL_HEIGHT));
            }
            outcome => panic!("unexpected outcome: {}", outcome),
        }
    }

    #[test]
    fn test_warp_without_glyphs_is_rejected() {
        let reference = render_scoreboard(&ScoreboardSpec {
            obstacles: 40,
            ..Default::default()
        });
        // Mask of a screen with no glyphs at all: nothing can be covered
        let empty = ScoreboardMask::new(image::GrayImage::new(CANONICAL_WIDTH, CANONICAL_HEIGHT));
        let calibrator = Calibrator::new(ReferenceModel::build(&reference), empty);

        assert!(calibrator.estimate(&shifted_frame()).is_ok());
        assert!(matches!(
            calibrator.calibrate(&shifted_frame()),
            CalibrationOutcome::BadHomography
        ));
    }
}
