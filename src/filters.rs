//! Pixel classification filters shared by every stage.
//!
//! All hue/saturation/value numbers use the 8-bit convention of the capture
//! tooling the thresholds were calibrated with: hue in 0..180, saturation and
//! value in 0..=255.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::Serialize;

/// Pixels with saturation at or below this may count as white.
pub const WHITE_MAX_SATURATION: u8 = 32;
/// Pixels with value at or above this may count as white.
pub const WHITE_MIN_VALUE: u8 = 230;
/// Pixels with value at or below this count as dark.
pub const DARK_MAX_VALUE: u8 = 16;
/// Grayscale binarization level used by the coarse match and the classifier.
pub const GRAY_BRIGHT_THRESHOLD: u8 = 230;

/// A color in 8-bit HSV.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Converts an RGB pixel to 8-bit HSV (hue halved to fit 0..180).
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> Hsv {
    let r = pixel[0] as f32;
    let g = pixel[1] as f32;
    let b = pixel[2] as f32;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        h: ((h / 2.0).round() as u16 % 180) as u8,
        s: s.round() as u8,
        v: max as u8,
    }
}

/// Luminance using the ITU-R BT.601 luma formula: Y = 0.299*R + 0.587*G + 0.114*B
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let y = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
    y.round().min(255.0) as u8
}

/// Near-white: low saturation and high value.
pub fn is_white(pixel: &Rgb<u8>) -> bool {
    let hsv = rgb_to_hsv(pixel);
    hsv.s <= WHITE_MAX_SATURATION && hsv.v >= WHITE_MIN_VALUE
}

/// Near-black: value at or below [`DARK_MAX_VALUE`].
pub fn is_dark(pixel: &Rgb<u8>) -> bool {
    pixel[0].max(pixel[1]).max(pixel[2]) <= DARK_MAX_VALUE
}

/// Grayscale brightness above [`GRAY_BRIGHT_THRESHOLD`].
pub fn is_bright_gray(pixel: &Rgb<u8>) -> bool {
    luma(pixel) > GRAY_BRIGHT_THRESHOLD
}

/// Binary mask (255 = white pixel, 0 otherwise).
pub fn white_mask(img: &RgbImage) -> GrayImage {
    binary_mask(img, is_white)
}

fn binary_mask(img: &RgbImage, pred: impl Fn(&Rgb<u8>) -> bool) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pred(pixel) { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Counts the white pixels of an image.
pub fn count_white(img: &RgbImage) -> usize {
    img.pixels().filter(|p| is_white(p)).count()
}
