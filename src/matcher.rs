//! Mask-based template matching.
//!
//! The scoreboard mask is a grayscale 1280×720 image whose bright pixels mark
//! where white glyphs are expected. Two primitives are built on it:
//! - a coarse whole-frame match used as the scene existence test
//! - windowed foreground/background matchers used as the fit metric

use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::{ScanError, ScanResult};
use crate::filters::{is_bright_gray, is_white};
use crate::layout::{is_canonical, PixelRect, CANONICAL_HEIGHT, CANONICAL_WIDTH};
use crate::locale::Language;

/// Minimum share of frame pixels that must agree with the mask.
pub const COARSE_FIT_THRESHOLD: f64 = 0.997;
/// Minimum share of the mask's foreground that must be present in the frame.
pub const COARSE_MIN_COVERAGE: f64 = 0.22;

const MASK_FILE_NAME: &str = "result_detail.png";

/// Result of the coarse whole-frame comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoarseFit {
    /// 1 - (bright frame pixels outside the mask foreground) / (all pixels)
    pub fit: f64,
    /// Bright frame pixels inside the foreground / foreground pixels
    pub coverage: f64,
}

impl CoarseFit {
    pub fn is_match(&self) -> bool {
        self.fit >= COARSE_FIT_THRESHOLD && self.coverage >= COARSE_MIN_COVERAGE
    }
}

/// The scoreboard mask for one localization.
#[derive(Clone, Debug)]
pub struct ScoreboardMask {
    mask: GrayImage,
    foreground_pixels: usize,
}

impl ScoreboardMask {
    /// Wraps a mask image. Non-canonical masks are rescaled to 1280×720.
    pub fn new(mask: GrayImage) -> Self {
        let mask = if mask.dimensions() == (CANONICAL_WIDTH, CANONICAL_HEIGHT) {
            mask
        } else {
            warn!(
                "Scoreboard mask is {}x{}, rescaling to canonical geometry",
                mask.width(),
                mask.height()
            );
            image::imageops::resize(
                &mask,
                CANONICAL_WIDTH,
                CANONICAL_HEIGHT,
                image::imageops::FilterType::Nearest,
            )
        };
        let foreground_pixels = mask.pixels().filter(|p| p[0] > 127).count();
        Self {
            mask,
            foreground_pixels,
        }
    }

    /// Loads the mask for the first preferred language that has one,
    /// falling back to the language-neutral mask.
    pub fn load(masks_dir: &Path, languages: &[Language]) -> ScanResult<Self> {
        let path = resolve_mask_path(masks_dir, languages);
        if !path.exists() {
            return Err(ScanError::MissingAsset { path });
        }
        info!("Loading scoreboard mask from {}", path.display());
        let mask = image::open(&path)?.to_luma8();
        Ok(Self::new(mask))
    }

    /// Returns true if the mask expects a white pixel at (x, y).
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] > 127
    }

    pub fn image(&self) -> &GrayImage {
        &self.mask
    }

    /// Compares the whole frame against the mask.
    ///
    /// Returns `None` when the frame does not have canonical geometry.
    pub fn coarse_fit(&self, frame: &RgbImage) -> Option<CoarseFit> {
        if !is_canonical(frame) {
            debug!(
                "Coarse match skipped: frame is {}x{}",
                frame.width(),
                frame.height()
            );
            return None;
        }

        let mut stray = 0usize;
        let mut covered = 0usize;
        for (x, y, pixel) in frame.enumerate_pixels() {
            if !is_bright_gray(pixel) {
                continue;
            }
            if self.is_foreground(x, y) {
                covered += 1;
            } else {
                stray += 1;
            }
        }

        let total = (CANONICAL_WIDTH * CANONICAL_HEIGHT) as f64;
        let coverage = if self.foreground_pixels == 0 {
            0.0
        } else {
            covered as f64 / self.foreground_pixels as f64
        };

        Some(CoarseFit {
            fit: 1.0 - stray as f64 / total,
            coverage,
        })
    }

    /// Coarse existence test for the scoreboard.
    pub fn coarse_match(&self, frame: &RgbImage) -> bool {
        self.coarse_fit(frame).is_some_and(|f| f.is_match())
    }

    /// Builds a windowed matcher over one region of the mask.
    pub fn matcher(&self, label: &'static str, rect: PixelRect) -> WindowMatcher {
        let template = image::imageops::crop_imm(&self.mask, rect.x, rect.y, rect.width, rect.height)
            .to_image();
        WindowMatcher {
            label,
            rect,
            template,
        }
    }
}

/// Picks `masks/<lang>/result_detail.png` for the first language that has
/// one, otherwise `masks/result_detail.png`.
pub fn resolve_mask_path(masks_dir: &Path, languages: &[Language]) -> PathBuf {
    for lang in languages {
        let candidate = masks_dir.join(lang.code()).join(MASK_FILE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }
    masks_dir.join(MASK_FILE_NAME)
}

/// Foreground/background classifier over one fixed window.
///
/// Foreground pixels of the template must be white in the frame, background
/// pixels must not be. The match ratio is the share of agreeing pixels.
#[derive(Clone, Debug)]
pub struct WindowMatcher {
    pub label: &'static str,
    pub rect: PixelRect,
    template: GrayImage,
}

impl WindowMatcher {
    /// Match ratio in [0, 1] at the window's own position.
    pub fn match_ratio(&self, frame: &RgbImage) -> f64 {
        self.match_ratio_shifted(frame, 0, 0)
    }

    /// Match ratio reading the frame at `(x + dx, y + dy)` for every window
    /// pixel, which scores the frame as if it had been shifted by `-(dx, dy)`.
    /// Pixels falling outside the frame count as background.
    pub fn match_ratio_shifted(&self, frame: &RgbImage, dx: i32, dy: i32) -> f64 {
        let area = self.template.width() as usize * self.template.height() as usize;
        if area == 0 {
            return 0.0;
        }
        let (fw, fh) = frame.dimensions();

        let mut agree = 0usize;
        for (tx, ty, t) in self.template.enumerate_pixels() {
            let fx = (self.rect.x + tx) as i64 + dx as i64;
            let fy = (self.rect.y + ty) as i64 + dy as i64;
            let white = fx >= 0
                && fy >= 0
                && (fx as u32) < fw
                && (fy as u32) < fh
                && is_white(frame.get_pixel(fx as u32, fy as u32));
            let expected = t[0] > 127;
            if white == expected {
                agree += 1;
            }
        }

        agree as f64 / area as f64
    }
}
