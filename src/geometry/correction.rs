//! Offset and resolution correction.
//!
//! A captured scoreboard may be shifted by a few pixels, letterboxed, or
//! skewed. Each correction strategy produces a [`Hypothesis`]; the one with
//! the highest template-fit score wins.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::{debug, info};
use std::sync::mpsc::Sender;

use crate::events::{emit, ScanEvent};
use crate::geometry::calibrator::{CalibrationOutcome, Calibrator};
use crate::layout::{
    crop, PixelRect, CANONICAL_HEIGHT, CANONICAL_WIDTH, LETTERBOX_PROBE, LOSE_LABEL,
    MARKER_GLYPH, WIN_LABEL,
};
use crate::matcher::{ScoreboardMask, WindowMatcher};

/// Offsets tried along each axis. Zero comes first so it wins ties.
pub const OFFSET_CANDIDATES: [i32; 11] = [0, -5, -4, -3, -2, -1, 1, 2, 3, 4, 5];

/// One candidate normalization of a frame.
#[derive(Clone, Debug)]
pub struct Hypothesis {
    pub frame: RgbImage,
    pub score: f64,
    /// Why the capture needed correcting, if it did.
    pub cause: Option<String>,
    /// Pixel offset the frame was shifted by.
    pub offset: Option<(i32, i32)>,
    pub acceptable: bool,
}

/// Template-fit metric over the WIN label, LOSE label and marker glyph.
#[derive(Clone, Debug)]
pub struct FitMetric {
    matchers: [WindowMatcher; 3],
}

impl FitMetric {
    pub fn new(mask: &ScoreboardMask) -> Self {
        Self {
            matchers: [
                mask.matcher("win", WIN_LABEL),
                mask.matcher("lose", LOSE_LABEL),
                mask.matcher("x", MARKER_GLYPH),
            ],
        }
    }

    /// Score in [0, 1]; 1 is a perfect fit.
    pub fn score(&self, frame: &RgbImage) -> f64 {
        self.score_shifted(frame, 0, 0)
    }

    /// Scores the frame as [`shift_frame`] would leave it, without copying.
    pub fn score_shifted(&self, frame: &RgbImage, dx: i32, dy: i32) -> f64 {
        let loss: f64 = self
            .matchers
            .iter()
            .map(|m| {
                let r = m.match_ratio_shifted(frame, dx, dy);
                (1.0 - r) * (1.0 - r)
            })
            .sum();
        1.0 - (loss / self.matchers.len() as f64).sqrt()
    }
}

/// Height of the black band above the WIN/LOSE labels.
///
/// Scans rows 0..30 of columns 30..50; rows whose RGB sum is zero are black.
/// Returns the largest black row index, 0 when none.
pub fn letterbox_margin(frame: &RgbImage) -> u32 {
    let probe = crop(frame, LETTERBOX_PROBE);
    (0..probe.height())
        .filter(|&y| {
            (0..probe.width()).all(|x| {
                let p = probe.get_pixel(x, y);
                p[0] == 0 && p[1] == 0 && p[2] == 0
            })
        })
        .max()
        .unwrap_or(0)
}

/// Shifts the frame so that `out(x, y) = in(x + dx, y + dy)`.
/// Uncovered pixels are black.
pub fn shift_frame(frame: &RgbImage, dx: i32, dy: i32) -> RgbImage {
    let (w, h) = frame.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let sx = x as i64 + dx as i64;
        let sy = y as i64 + dy as i64;
        if sx >= 0 && sy >= 0 && (sx as u32) < w && (sy as u32) < h {
            *frame.get_pixel(sx as u32, sy as u32)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Brute-force search over [`OFFSET_CANDIDATES`]².
/// Returns the best offset and its score; the first best wins.
pub fn probe_offset(metric: &FitMetric, frame: &RgbImage) -> ((i32, i32), f64) {
    let mut best = ((0, 0), f64::NEG_INFINITY);
    for &dx in &OFFSET_CANDIDATES {
        for &dy in &OFFSET_CANDIDATES {
            let score = metric.score_shifted(frame, dx, dy);
            if score > best.1 {
                best = ((dx, dy), score);
            }
        }
    }
    best
}

/// Picks the highest-scoring hypothesis; ties go to the earliest.
/// Returns `None` only for an empty batch.
pub fn select_best(hypotheses: Vec<Hypothesis>) -> Option<Hypothesis> {
    let mut best: Option<Hypothesis> = None;
    for h in hypotheses {
        match &best {
            Some(b) if b.score >= h.score => {}
            _ => best = Some(h),
        }
    }
    best
}

/// Runs every correction strategy over a frame.
pub struct Corrector {
    metric: FitMetric,
    calibrator: Option<Calibrator>,
}

impl Corrector {
    pub fn new(mask: &ScoreboardMask, calibrator: Option<Calibrator>) -> Self {
        Self {
            metric: FitMetric::new(mask),
            calibrator,
        }
    }

    pub fn metric(&self) -> &FitMetric {
        &self.metric
    }

    /// Generates the hypothesis batch for a frame. Never empty: the
    /// uncorrected frame is always present and acceptable.
    pub fn hypotheses(&self, frame: &RgbImage) -> Vec<Hypothesis> {
        let mut batch = Vec::new();

        self.letterbox_hypotheses(frame, &mut batch);

        batch.push(Hypothesis {
            frame: frame.clone(),
            score: self.metric.score(frame),
            cause: None,
            offset: None,
            acceptable: true,
        });

        let ((dx, dy), score) = probe_offset(&self.metric, frame);
        if (dx, dy) != (0, 0) {
            batch.push(Hypothesis {
                frame: shift_frame(frame, dx, dy),
                score,
                cause: Some(format!("Offset ({}, {})", dx, dy)),
                offset: Some((dx, dy)),
                acceptable: true,
            });
        }

        if let Some(calibrator) = &self.calibrator {
            match calibrator.calibrate(frame) {
                CalibrationOutcome::Warped(warped) => {
                    let score = self.metric.score(&warped);
                    batch.push(Hypothesis {
                        frame: warped,
                        score,
                        cause: Some("Perspective skew".to_string()),
                        offset: None,
                        acceptable: true,
                    });
                }
                outcome => debug!("Perspective correction unavailable: {}", outcome),
            }
        }

        for h in &batch {
            debug!(
                "Hypothesis {}: score {:.4}",
                h.cause.as_deref().unwrap_or("(none)"),
                h.score
            );
        }

        batch
    }

    fn letterbox_hypotheses(&self, frame: &RgbImage, batch: &mut Vec<Hypothesis>) {
        let margin = letterbox_margin(frame);
        if margin == 0 {
            return;
        }
        let (w, h) = frame.dimensions();
        let my = margin + 1;
        let mx = my * CANONICAL_WIDTH / CANONICAL_HEIGHT;

        let candidates = [
            ("Wrong resolution & aspect", PixelRect::new(0, my, w, h.saturating_sub(2 * my))),
            (
                "Wrong resolution",
                PixelRect::new(mx, my, w.saturating_sub(2 * mx), h.saturating_sub(2 * my)),
            ),
        ];
        for (cause, rect) in candidates {
            if rect.width == 0 || rect.height == 0 {
                continue;
            }
            let resized = imageops::resize(
                &crop(frame, rect),
                CANONICAL_WIDTH,
                CANONICAL_HEIGHT,
                FilterType::Triangle,
            );
            batch.push(Hypothesis {
                score: self.metric.score(&resized),
                frame: resized,
                cause: Some(cause.to_string()),
                offset: None,
                acceptable: false,
            });
        }
    }

    /// Normalizes a frame: builds the batch, picks the best hypothesis and
    /// reports what was corrected.
    pub fn correct(&self, frame: &RgbImage, events: &Sender<ScanEvent>) -> Hypothesis {
        let batch = self.hypotheses(frame);
        let best = match select_best(batch) {
            Some(best) => best,
            None => Hypothesis {
                frame: frame.clone(),
                score: self.metric.score(frame),
                cause: None,
                offset: None,
                acceptable: true,
            },
        };

        if let Some(cause) = &best.cause {
            info!(
                "Capture setting might be wrong. {} (recover score={:.4})",
                cause, best.score
            );
            emit(
                events,
                ScanEvent::CaptureDiagnostic {
                    cause: cause.clone(),
                    score: best.score,
                },
            );
        }
        if let Some(offset) = best.offset {
            emit(events, ScanEvent::Calibration { offset });
        }

        best
    }
}
