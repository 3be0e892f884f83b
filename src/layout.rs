//! Canonical scoreboard geometry.
//!
//! Every coordinate in this crate is calibrated against a 1280×720 capture of
//! the scoreboard. Frames are brought to this geometry before any fixed
//! offset is applied.

use image::RgbImage;

pub const CANONICAL_WIDTH: u32 = 1280;
pub const CANONICAL_HEIGHT: u32 = 720;

/// Top edge of each of the 8 player slots, in slot order.
pub const ENTRY_TOPS: [u32; 8] = [101, 166, 231, 296, 431, 496, 561, 626];
/// Left edge of every player slot.
pub const ENTRY_LEFT: u32 = 610;
pub const ENTRY_WIDTH: u32 = 630;
pub const ENTRY_HEIGHT: u32 = 45;
pub const SLOT_COUNT: usize = 8;
pub const SLOTS_PER_TEAM: usize = 4;

/// Horizontal strip (slot-relative) holding the marker glyph before the K/D digits.
pub const MARKER_STRIP_LEFT: u32 = 1173 - ENTRY_LEFT;
pub const MARKER_STRIP_WIDTH: u32 = 13;

/// Band of the last slot used by the frame-difference stability test.
pub const DIFF_BAND: PixelRect = PixelRect::new(640, 626, 640, 45);

/// Strip above the WIN/LOSE labels scanned for a letterbox margin.
pub const LETTERBOX_PROBE: PixelRect = PixelRect::new(30, 0, 20, 30);

/// Template windows used by the fit metric.
pub const WIN_LABEL: PixelRect = PixelRect::new(651, 47, 99, 33);
pub const LOSE_LABEL: PixelRect = PixelRect::new(651, 378, 99, 33);
pub const MARKER_GLYPH: PixelRect = PixelRect::new(1173, 101, 14, 40);

/// Team color sample points: upper (winning) team and lower (losing) team.
pub const UPPER_TEAM_COLOR_AT: (u32, u32) = (1228, 115);
pub const LOWER_TEAM_COLOR_AT: (u32, u32) = (1228, 452);

/// Left part of the frame that carries no stable features for calibration.
pub const UNSTABLE_REGION_RIGHT: u32 = 680;
/// Columns from here on compensate known glare in the feature image.
pub const GLARE_BAND_LEFT: u32 = 1000;

/// An axis-aligned rectangle in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Clamps the rectangle to an image of the given size.
    pub fn clamp_to(&self, width: u32, height: u32) -> PixelRect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        PixelRect {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

/// Returns true if the image has the canonical 1280×720 geometry.
pub fn is_canonical(img: &RgbImage) -> bool {
    img.dimensions() == (CANONICAL_WIDTH, CANONICAL_HEIGHT)
}

/// Crops a sub-region, clamping to image bounds.
pub fn crop(img: &RgbImage, rect: PixelRect) -> RgbImage {
    let (w, h) = img.dimensions();
    let r = rect.clamp_to(w, h);
    image::imageops::crop_imm(img, r.x, r.y, r.width, r.height).to_image()
}
