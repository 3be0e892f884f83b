//! Oriented FAST keypoints with rotated BRIEF descriptors.
//!
//! Corners are detected with FAST-9 over a small image pyramid, oriented by
//! their intensity centroid and described by 256 binary intensity tests on a
//! smoothed copy of each pyramid level. Descriptors are compared by Hamming
//! distance.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// 256-bit binary descriptor.
pub type Descriptor = [u8; 32];

const DESCRIPTOR_BITS: usize = 256;
const PATTERN_RADIUS: i32 = 13;
const PATTERN_SEED: u64 = 0x5c0e_b0a2d;
const ORIENTATION_RADIUS: i32 = 15;
const PATCH_SIZE: f32 = 31.0;
/// Keypoints closer than this to a level's border are not described.
const BORDER: u32 = 24;

static PATTERN: OnceLock<Vec<[(i32, i32); 2]>> = OnceLock::new();

/// A detected keypoint in level-0 pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Patch diameter at level 0.
    pub size: f32,
    /// Orientation in degrees, [0, 360).
    pub angle: f32,
    pub response: f32,
    pub octave: u32,
    pub class_id: i32,
}

/// Keypoints with their descriptors, aligned 1:1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct DetectorParams {
    pub levels: u32,
    pub scale_factor: f32,
    pub fast_threshold: u8,
    pub nms_radius: u32,
    pub max_per_level: usize,
    pub blur_sigma: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            levels: 4,
            scale_factor: 1.5,
            fast_threshold: 20,
            nms_radius: 3,
            max_per_level: 250,
            blur_sigma: 2.0,
        }
    }
}

/// A descriptor correspondence between a query set and a train set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: u32,
}

/// Detects and describes features over the image pyramid.
pub fn detect_and_describe(img: &GrayImage, params: &DetectorParams) -> FeatureSet {
    let mut set = FeatureSet::default();
    let pattern = brief_pattern();

    let mut scale = 1.0f32;
    for octave in 0..params.levels {
        let level = if octave == 0 {
            img.clone()
        } else {
            let w = (img.width() as f32 / scale).round() as u32;
            let h = (img.height() as f32 / scale).round() as u32;
            if w <= 2 * BORDER || h <= 2 * BORDER {
                break;
            }
            imageops::resize(img, w, h, FilterType::Triangle)
        };
        let smoothed = gaussian_blur_f32(&level, params.blur_sigma);

        let corners = suppress_non_maxima(
            corners_fast9(&level, params.fast_threshold)
                .into_iter()
                .map(|c| (c.x, c.y, c.score))
                .collect(),
            params.nms_radius,
            params.max_per_level,
            level.width(),
            level.height(),
        );

        for (x, y, score) in corners {
            let angle = intensity_centroid_angle(&level, x, y);
            let descriptor = describe(&smoothed, x, y, angle, pattern);
            set.keypoints.push(Keypoint {
                x: x as f32 * scale,
                y: y as f32 * scale,
                size: PATCH_SIZE * scale,
                angle: angle.to_degrees().rem_euclid(360.0),
                response: score,
                octave,
                class_id: -1,
            });
            set.descriptors.push(descriptor);
        }

        scale *= params.scale_factor;
    }

    set
}

/// Keeps the strongest corners that are at least `radius` apart and away
/// from the border, at most `limit` of them.
fn suppress_non_maxima(
    mut corners: Vec<(u32, u32, f32)>,
    radius: u32,
    limit: usize,
    width: u32,
    height: u32,
) -> Vec<(u32, u32, f32)> {
    corners.retain(|&(x, y, _)| {
        x >= BORDER && y >= BORDER && x + BORDER < width && y + BORDER < height
    });
    corners.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

    let mut kept: Vec<(u32, u32, f32)> = Vec::new();
    for c in corners {
        if kept.len() >= limit {
            break;
        }
        let close = kept
            .iter()
            .any(|k| k.0.abs_diff(c.0) <= radius && k.1.abs_diff(c.1) <= radius);
        if !close {
            kept.push(c);
        }
    }
    kept
}

/// Orientation of the patch from its intensity centroid, in radians.
fn intensity_centroid_angle(img: &GrayImage, cx: u32, cy: u32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = img.get_pixel((cx as i32 + dx) as u32, (cy as i32 + dy) as u32)[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

fn describe(img: &GrayImage, cx: u32, cy: u32, angle: f32, pattern: &[[(i32, i32); 2]]) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let sample = |(px, py): (i32, i32)| -> u8 {
        let rx = (px as f32 * cos - py as f32 * sin).round() as i32;
        let ry = (px as f32 * sin + py as f32 * cos).round() as i32;
        img.get_pixel((cx as i32 + rx) as u32, (cy as i32 + ry) as u32)[0]
    };

    let mut desc = [0u8; 32];
    for (i, [a, b]) in pattern.iter().enumerate() {
        if sample(*a) < sample(*b) {
            desc[i / 8] |= 1 << (i % 8);
        }
    }
    desc
}

/// The fixed sampling pattern, identical for every run.
fn brief_pattern() -> &'static [[(i32, i32); 2]] {
    PATTERN.get_or_init(|| {
        let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
        let mut point = || {
            (
                rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
                rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
            )
        };
        (0..DESCRIPTOR_BITS).map(|_| [point(), point()]).collect()
    })
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Brute-force 2-nearest-neighbour matching with a ratio test.
///
/// A query descriptor matches its nearest train descriptor when that
/// distance is below `ratio` times the second-nearest distance.
pub fn match_descriptors(query: &[Descriptor], train: &[Descriptor], ratio: f32) -> Vec<FeatureMatch> {
    let mut matches = Vec::new();
    if train.len() < 2 {
        return matches;
    }

    for (qi, q) in query.iter().enumerate() {
        let mut best = (u32::MAX, 0usize);
        let mut second = u32::MAX;
        for (ti, t) in train.iter().enumerate() {
            let d = hamming_distance(q, t);
            if d < best.0 {
                second = best.0;
                best = (d, ti);
            } else if d < second {
                second = d;
            }
        }
        if (best.0 as f32) < ratio * second as f32 {
            matches.push(FeatureMatch {
                query_idx: qi,
                train_idx: best.1,
                distance: best.0,
            });
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use rand::Rng;

    fn random_blocks(seed: u64, width: u32, height: u32) -> GrayImage {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut img = GrayImage::from_pixel(width, height, Luma([0]));
        for _ in 0..60 {
            let x = rng.gen_range(30..width - 60);
            let y = rng.gen_range(30..height - 60);
            let w = rng.gen_range(8..40);
            let h = rng.gen_range(8..40);
            for yy in y..y + h {
                for xx in x..x + w {
                    img.put_pixel(xx, yy, Luma([255]));
                }
            }
        }
        img
    }

    #[test]
    fn test_hamming_distance() {
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        assert_eq!(hamming_distance(&a, &b), 0);
        b[0] = 0b1011;
        b[31] = 0xff;
        assert_eq!(hamming_distance(&a, &b), 11);
    }

    #[test]
    fn test_pattern_is_stable() {
        let p = brief_pattern();
        assert_eq!(p.len(), 256);
        assert!(p
            .iter()
            .flatten()
            .all(|(x, y)| x.abs() <= PATTERN_RADIUS && y.abs() <= PATTERN_RADIUS));
        assert!(std::ptr::eq(p, brief_pattern()));
    }

    #[test]
    fn test_detect_is_deterministic() {
        let img = random_blocks(7, 320, 240);
        let params = DetectorParams::default();
        let a = detect_and_describe(&img, &params);
        let b = detect_and_describe(&img, &params);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        assert_eq!(a.keypoints.len(), a.descriptors.len());
        assert!(a.keypoints.iter().all(|k| k.class_id == -1));
    }

    #[test]
    fn test_blank_image_has_no_features() {
        let img = GrayImage::from_pixel(200, 200, Luma([128]));
        assert!(detect_and_describe(&img, &DetectorParams::default()).is_empty());
    }

    #[test]
    fn test_nms_keeps_strongest_and_spaces_out() {
        let corners = vec![(50, 50, 10.0), (51, 50, 20.0), (60, 60, 5.0), (2, 2, 99.0)];
        let kept = suppress_non_maxima(corners, 3, 10, 200, 200);
        assert_eq!(kept, vec![(51, 50, 20.0), (60, 60, 5.0)]);
    }

    #[test]
    fn test_translated_image_matches_itself() {
        let img = random_blocks(11, 400, 300);
        let shifted = GrayImage::from_fn(400, 300, |x, y| {
            if x >= 6 && y >= 4 {
                *img.get_pixel(x - 6, y - 4)
            } else {
                Luma([0])
            }
        });
        let params = DetectorParams {
            levels: 1,
            max_per_level: 2000,
            ..Default::default()
        };
        let a = detect_and_describe(&img, &params);
        let b = detect_and_describe(&shifted, &params);

        let matches = match_descriptors(&a.descriptors, &b.descriptors, 0.75);
        assert!(matches.len() >= 4);

        let consistent = matches
            .iter()
            .filter(|m| {
                let ka = a.keypoints[m.query_idx];
                let kb = b.keypoints[m.train_idx];
                kb.x - ka.x == 6.0 && kb.y - ka.y == 4.0
            })
            .count();
        assert!(consistent >= 4);
        assert!(consistent * 2 > matches.len());
    }

    #[test]
    fn test_match_needs_two_train_descriptors() {
        let q = vec![[0u8; 32]];
        assert!(match_descriptors(&q, &[[0u8; 32]], 0.75).is_empty());
    }
}
