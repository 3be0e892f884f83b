//! Entrance-animation settle detection.
//!
//! Player rows slide in from the right one after another. While that
//! animation runs, the "x" glyph in front of each row's kill/death counts
//! sits at different columns; once every row has landed they line up.

use image::RgbImage;
use std::collections::VecDeque;

use crate::filters::is_white;
use crate::layout::{MARKER_STRIP_LEFT, MARKER_STRIP_WIDTH};

/// Number of recent spread samples kept while tracking.
pub const SPREAD_HISTORY_LEN: usize = 4;

/// Mean column (strip-relative) of the non-empty columns of the marker strip
/// in one entry, or `None` when no white pixel is present.
pub fn marker_column(entry: &RgbImage) -> Option<f64> {
    let right = (MARKER_STRIP_LEFT + MARKER_STRIP_WIDTH).min(entry.width());
    let columns: Vec<u32> = (MARKER_STRIP_LEFT..right)
        .filter(|&x| (0..entry.height()).any(|y| is_white(entry.get_pixel(x, y))))
        .map(|x| x - MARKER_STRIP_LEFT)
        .collect();

    if columns.is_empty() {
        return None;
    }
    Some(columns.iter().sum::<u32>() as f64 / columns.len() as f64)
}

/// Horizontal spread of the marker glyphs across entries, truncated to whole
/// pixels. Entries without a marker are skipped; 0 when nothing is measured.
pub fn marker_spread(entries: &[RgbImage]) -> u32 {
    let positions: Vec<f64> = entries.iter().filter_map(marker_column).collect();
    if positions.is_empty() {
        return 0;
    }
    let min = positions.iter().copied().fold(f64::INFINITY, f64::min);
    let max = positions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (max - min) as u32
}

/// Recent non-zero spread samples of one appearance.
#[derive(Clone, Debug, Default)]
pub struct SpreadHistory {
    samples: VecDeque<u32>,
}

impl SpreadHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample. Once the window is full, the screen counts as
    /// settled when the latest sample is no worse than any recent one.
    pub fn push(&mut self, spread: u32) -> bool {
        self.samples.push_back(spread);
        while self.samples.len() > SPREAD_HISTORY_LEN {
            self.samples.pop_front();
        }
        self.samples.len() == SPREAD_HISTORY_LEN && self.min() == Some(spread)
    }

    pub fn min(&self) -> Option<u32> {
        self.samples.iter().copied().min()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
