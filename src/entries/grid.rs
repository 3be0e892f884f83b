//! Player entry extraction.
//!
//! The scoreboard lists 8 players at fixed rows. If the last row is still
//! sliding in, its window is moved right until its marker lines up with
//! the others.

use image::RgbImage;
use log::debug;

use crate::entries::stability::marker_spread;
use crate::filters::count_white;
use crate::layout::{PixelRect, ENTRY_HEIGHT, ENTRY_LEFT, ENTRY_TOPS, ENTRY_WIDTH, SLOT_COUNT};

/// Maximum corrective re-slices of the last occupied slot.
pub const MAX_RESLICE_PASSES: usize = 3;
/// A slot with fewer white pixels than this is treated as empty.
pub const MIN_OCCUPIED_WHITE: usize = 4;

/// Entries cut from one normalized frame.
#[derive(Clone, Debug)]
pub struct EntryGrid {
    pub entries: Vec<RgbImage>,
    /// Spread measured on the plain fixed-grid slicing.
    pub initial_spread: u32,
    /// Spread after the corrective passes.
    pub final_spread: u32,
    /// Number of corrective re-slices performed.
    pub passes: usize,
}

/// Window of a slot, moved right by `shift` pixels.
pub fn slot_rect(slot: usize, shift: u32) -> PixelRect {
    PixelRect::new(ENTRY_LEFT + shift, ENTRY_TOPS[slot], ENTRY_WIDTH, ENTRY_HEIGHT)
}

/// Crops a full-size entry. Parts of the window outside the frame are
/// left black.
fn cut_entry(frame: &RgbImage, rect: PixelRect) -> RgbImage {
    let mut entry = RgbImage::new(rect.width, rect.height);
    let (fw, fh) = frame.dimensions();
    let visible = rect.clamp_to(fw, fh);
    if visible.width > 0 && visible.height > 0 {
        let view = image::imageops::crop_imm(frame, visible.x, visible.y, visible.width, visible.height)
            .to_image();
        image::imageops::replace(&mut entry, &view, 0, 0);
    }
    entry
}

/// Slices the frame into the 8 fixed slots.
pub fn extract_entries(frame: &RgbImage) -> Vec<RgbImage> {
    (0..SLOT_COUNT)
        .map(|slot| cut_entry(frame, slot_rect(slot, 0)))
        .collect()
}

/// Index of the last slot holding a player: walks up from slot 7 while the
/// slot looks empty, stopping at slot 0.
pub fn last_occupied_slot(entries: &[RgbImage]) -> usize {
    let mut index = entries.len().saturating_sub(1);
    while index > 0 && count_white(&entries[index]) < MIN_OCCUPIED_WHITE {
        index -= 1;
    }
    index
}

/// Slices the frame and corrects the last occupied slot if it has not
/// finished sliding in.
pub fn extract_settled(frame: &RgbImage) -> EntryGrid {
    let mut entries = extract_entries(frame);
    let initial_spread = marker_spread(&entries);
    let mut spread = initial_spread;
    let mut passes = 0;

    if spread > 0 {
        let index = last_occupied_slot(&entries);
        let max_shift = frame.width().saturating_sub(ENTRY_LEFT);
        let mut shift = 0u32;

        for _ in 0..MAX_RESLICE_PASSES {
            if spread == 0 {
                break;
            }
            shift = (shift + spread).min(max_shift);
            entries[index] = cut_entry(frame, slot_rect(index, shift));
            passes += 1;
            spread = marker_spread(&entries);
            debug!(
                "Re-sliced slot {} with shift {}: spread now {}",
                index, shift, spread
            );
        }
    }

    EntryGrid {
        entries,
        initial_spread,
        final_spread: spread,
        passes,
    }
}
