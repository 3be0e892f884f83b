//! Synthetic scoreboard rendering for unit tests.
//!
//! Renders a canonical 1280×720 scoreboard with WIN/LOSE labels, per-row
//! marker glyphs, self highlight, turf "p" suffixes and festival titles at
//! the real layout coordinates. The test mask is the white-pixel map of the
//! default rendering, so a default frame matches it exactly.

use image::{GrayImage, Rgb, RgbImage};
use log::{LevelFilter, Log, Metadata, Record};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};

use crate::filters::white_mask;
use crate::layout::{
    PixelRect, CANONICAL_HEIGHT, CANONICAL_WIDTH, ENTRY_HEIGHT, ENTRY_LEFT, ENTRY_TOPS,
    ENTRY_WIDTH, LOSE_LABEL, WIN_LABEL,
};
use crate::matcher::ScoreboardMask;
use crate::result::{BattleMode, EntryImages, GameResult, PlayerRecord, TeamColor};

pub(crate) const BACKGROUND: Rgb<u8> = Rgb([70, 70, 90]);
pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub(crate) const FEST_YELLOW: Rgb<u8> = Rgb([238, 255, 0]);

static MASK: OnceLock<ScoreboardMask> = OnceLock::new();

/// Keeps every logged message so tests can look for warnings.
struct CapturedLog(Mutex<Vec<String>>);

impl Log for CapturedLog {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static CAPTURED: CapturedLog = CapturedLog(Mutex::new(Vec::new()));

/// Installs the capturing logger at warn level. Lines from concurrently
/// running tests end up in the same buffer.
pub(crate) fn capture_log() {
    let _ = log::set_logger(&CAPTURED);
    log::set_max_level(LevelFilter::Warn);
}

pub(crate) fn captured_lines() -> Vec<String> {
    CAPTURED.0.lock().map(|lines| lines.clone()).unwrap_or_default()
}

#[derive(Clone, Debug)]
pub(crate) struct ScoreboardSpec {
    /// Content appears at `canonical + offset`.
    pub offset: (i32, i32),
    pub self_slot: Option<usize>,
    pub turf: bool,
    pub festival: bool,
    /// Extra rightward shift of the last row, as during the entrance animation.
    pub last_slot_shift: u32,
    /// Number of black rectangles scattered over the right half.
    pub obstacles: usize,
    /// Color of a small near-white block in the last row.
    pub last_slot_tint: Option<Rgb<u8>>,
}

impl Default for ScoreboardSpec {
    fn default() -> Self {
        Self {
            offset: (0, 0),
            self_slot: Some(0),
            turf: true,
            festival: false,
            last_slot_shift: 0,
            obstacles: 0,
            last_slot_tint: None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct EntrySpec {
    pub is_self: bool,
    pub turf: bool,
    pub festival: bool,
}

impl Default for EntrySpec {
    fn default() -> Self {
        Self {
            is_self: false,
            turf: true,
            festival: false,
        }
    }
}

/// Fills a rectangle, clipped to the image.
fn fill(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    for yy in y..y + h as i32 {
        for xx in x..x + w as i32 {
            if xx >= 0 && yy >= 0 && (xx as u32) < img.width() && (yy as u32) < img.height() {
                img.put_pixel(xx as u32, yy as u32, color);
            }
        }
    }
}

/// Blocky pseudo-random glyph pattern filling a label rectangle.
fn draw_label(img: &mut RgbImage, rect: PixelRect, offset: (i32, i32)) {
    for by in 0..rect.height / 3 {
        for bx in 0..rect.width / 3 {
            let hash = (bx.wrapping_mul(2_654_435_761) ^ by.wrapping_mul(40_503)) >> 7;
            if hash & 1 == 1 {
                fill(
                    img,
                    (rect.x + bx * 3) as i32 + offset.0,
                    (rect.y + by * 3) as i32 + offset.1,
                    3,
                    3,
                    WHITE,
                );
            }
        }
    }
}

/// Draws one entry with its top-left corner at `(x, y)`.
fn draw_entry(img: &mut RgbImage, x: i32, y: i32, spec: &EntrySpec) {
    // "x" marker in front of the kill/death counts
    fill(img, x + 567, y + 12, 5, 21, WHITE);
    if spec.turf {
        fill(img, x + 505, y + 20, 10, 10, WHITE);
    }
    if spec.is_self {
        fill(img, x + 2, y + 5, 38, 35, WHITE);
    }
    if spec.festival {
        let name_left = if spec.is_self { 160 } else { 199 };
        fill(img, x + name_left + 20, y + 4, 100, 14, FEST_YELLOW);
    }
}

pub(crate) fn render_entry(spec: &EntrySpec) -> RgbImage {
    let mut img = RgbImage::from_pixel(ENTRY_WIDTH, ENTRY_HEIGHT, BACKGROUND);
    draw_entry(&mut img, 0, 0, spec);
    img
}

pub(crate) fn render_scoreboard(spec: &ScoreboardSpec) -> RgbImage {
    let mut img = RgbImage::from_pixel(CANONICAL_WIDTH, CANONICAL_HEIGHT, BACKGROUND);
    let (ox, oy) = spec.offset;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..spec.obstacles {
        let x = rng.gen_range(700..1230);
        let y = rng.gen_range(20..690);
        let w = rng.gen_range(10..40);
        let h = rng.gen_range(10..40);
        fill(&mut img, x + ox, y + oy, w, h, Rgb([0, 0, 0]));
    }

    draw_label(&mut img, WIN_LABEL, spec.offset);
    draw_label(&mut img, LOSE_LABEL, spec.offset);

    for (slot, &top) in ENTRY_TOPS.iter().enumerate() {
        let shift = if slot == 7 { spec.last_slot_shift } else { 0 };
        let x = (ENTRY_LEFT + shift) as i32 + ox;
        let y = top as i32 + oy;
        draw_entry(
            &mut img,
            x,
            y,
            &EntrySpec {
                is_self: spec.self_slot == Some(slot),
                turf: spec.turf,
                festival: spec.festival,
            },
        );
        if slot == 7 {
            if let Some(tint) = spec.last_slot_tint {
                fill(&mut img, x + 250, y + 10, 50, 20, tint);
            }
        }
    }

    img
}

/// Mask matching the default rendering.
pub(crate) fn scoreboard_mask() -> ScoreboardMask {
    MASK.get_or_init(|| {
        ScoreboardMask::new(white_mask(&render_scoreboard(&ScoreboardSpec::default())))
    })
    .clone()
}

pub(crate) fn blank_images() -> EntryImages {
    EntryImages {
        rank: RgbImage::new(43, 25),
        weapon: RgbImage::new(47, 45),
        name: RgbImage::new(180, 45),
        name_normalized: GrayImage::new(0, 0),
        score: RgbImage::new(115, 45),
        kills: RgbImage::new(31, 21),
        deaths: RgbImage::new(31, 21),
        fest_title: None,
    }
}

/// A result with 8 empty turf records and no self row.
pub(crate) fn sample_result() -> GameResult {
    let color = TeamColor::from_pixel(&BACKGROUND);
    GameResult {
        won: None,
        is_fest: false,
        my_team_color: color,
        counter_team_color: color,
        players: (0..8)
            .map(|slot| PlayerRecord {
                slot,
                team: PlayerRecord::team_of(slot),
                rank_in_team: PlayerRecord::rank_in_team_of(slot),
                is_self: false,
                battle_mode: BattleMode::Turf,
                rank: None,
                kills: None,
                deaths: None,
                score: None,
                weapon: None,
                udemae: None,
                fest: None,
                my_kills: 0,
                images: blank_images(),
            })
            .collect(),
        kills: Vec::new(),
        kills_per_weapon: BTreeMap::new(),
        scoreboard: RgbImage::new(CANONICAL_WIDTH, CANONICAL_HEIGHT),
    }
}
