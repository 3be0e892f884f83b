//! Per-entry field classification.
//!
//! Decides whether an entry is the local player, which battle mode the game
//! was, whether festival titles are shown, and cuts the sub-images the
//! recognizers read. All coordinates are relative to the entry's top-left
//! corner.

use image::{GrayImage, Luma, RgbImage};
use log::{debug, warn};

use crate::error::ScanError;
use crate::filters::{is_bright_gray, rgb_to_hsv, white_mask};
use crate::layout::{crop, PixelRect, ENTRY_HEIGHT};
use crate::locale::Language;
use crate::recognition::recognizers::{FestLabel, Recognizers};
use crate::result::{BattleMode, EntryImages, FestTitle, PlayerRecord};

const SELF_PROBE_WIDTH: u32 = 43;

const RANK_LEFT: u32 = 43;
const RANK_LEFT_SELF: u32 = 2;
const RANK_TOP: u32 = 20;
const RANK_WIDTH: u32 = 43;

const WEAPON_LEFT: u32 = 150;
const WEAPON_LEFT_SELF: u32 = 109;
const WEAPON_WIDTH: u32 = 47;

const NAME_LEFT: u32 = 199;
const NAME_LEFT_SELF: u32 = 160;
const NAME_WIDTH: u32 = 180;

const SCORE_LEFT: u32 = 385;
const SCORE_WIDTH: u32 = 115;
const SCORE_P_LEFT: u32 = SCORE_LEFT + SCORE_WIDTH;
const SCORE_P_WIDTH: u32 = 20;

const KD_LEFT: u32 = 575;
const KD_WIDTH: u32 = 31;
const KD_HEIGHT: u32 = 21;

/// Festival titles occupy the upper half of the name area.
const FEST_TITLE_HEIGHT: u32 = 23;
const FEST_HUE_MIN: u8 = 30;
const FEST_HUE_MAX: u8 = 34;
const FEST_MIN_VALUE: u8 = 240;
const FEST_GENDER_WIDTH: u32 = 36;
const FEST_LEVEL_WIDTH: u32 = 52;
const FEST_MIN_TITLE_WIDTH: u32 = 4;

/// Mean level (0..255) of the thresholded "p" suffix below which the game
/// is ranked.
const RANKED_SCORE_P_MEAN: f64 = 16.0;

/// Returns true if the entry is highlighted as the local player.
pub fn is_self_entry(entry: &RgbImage) -> bool {
    let probe = crop(entry, PixelRect::new(0, 0, SELF_PROBE_WIDTH, ENTRY_HEIGHT));
    let bright = probe.pixels().filter(|p| is_bright_gray(p)).count();
    // Normalized so that 10% coverage scores 1.0.
    bright * 10 > (SELF_PROBE_WIDTH * ENTRY_HEIGHT) as usize
}

/// Binary mask of festival-yellow text.
pub fn festival_mask(title: &RgbImage) -> GrayImage {
    let (w, h) = title.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let hsv = rgb_to_hsv(title.get_pixel(x, y));
        let hit = (FEST_HUE_MIN..=FEST_HUE_MAX).contains(&hsv.h) && hsv.v >= FEST_MIN_VALUE;
        Luma([if hit { 255 } else { 0 }])
    })
}

/// True when festival-yellow covers more than 1/16 of the mask.
pub fn is_festival_mask(mask: &GrayImage) -> bool {
    let hits = mask.pixels().filter(|p| p[0] > 0).count();
    hits * 255 > mask.width() as usize * mask.height() as usize * 16
}

/// Battle mode from the festival flag and the turf-score "p" suffix.
pub fn battle_mode(score_p: &RgbImage, festival: bool) -> BattleMode {
    if festival {
        return BattleMode::Festival;
    }
    let area = score_p.width() as usize * score_p.height() as usize;
    let bright = score_p.pixels().filter(|p| is_bright_gray(p)).count();
    let mean = if area == 0 {
        0.0
    } else {
        bright as f64 * 255.0 / area as f64
    };
    if mean < RANKED_SCORE_P_MEAN {
        BattleMode::Ranked
    } else {
        BattleMode::Turf
    }
}

/// The gender and level parts of a festival title mask.
#[derive(Clone, Debug)]
pub struct FestTitleParts {
    pub gender: GrayImage,
    pub level: GrayImage,
}

/// Splits a title mask at its content bounds. `None` when the title is
/// narrower than a few pixels.
pub fn split_fest_title(mask: &GrayImage) -> Option<FestTitleParts> {
    let columns: Vec<u32> = (0..mask.width())
        .filter(|&x| (0..mask.height()).any(|y| mask.get_pixel(x, y)[0] > 0))
        .collect();
    let x1 = *columns.first()?;
    let x2 = *columns.last()?;
    if x2 - x1 < FEST_MIN_TITLE_WIDTH {
        return None;
    }

    let gender_left = x2.saturating_sub(FEST_GENDER_WIDTH);
    let level_width = FEST_LEVEL_WIDTH.min(mask.width() - x1);
    Some(FestTitleParts {
        gender: image::imageops::crop_imm(mask, gender_left, 0, x2 - gender_left, mask.height())
            .to_image(),
        level: image::imageops::crop_imm(mask, x1, 0, level_width, mask.height()).to_image(),
    })
}

/// White-text mask of a name, trimmed to its content.
pub fn normalize_name(name: &RgbImage) -> GrayImage {
    let mask = white_mask(name);
    let xs: Vec<u32> = (0..mask.width())
        .filter(|&x| (0..mask.height()).any(|y| mask.get_pixel(x, y)[0] > 0))
        .collect();
    let ys: Vec<u32> = (0..mask.height())
        .filter(|&y| (0..mask.width()).any(|x| mask.get_pixel(x, y)[0] > 0))
        .collect();
    match (xs.first(), xs.last(), ys.first(), ys.last()) {
        (Some(&x1), Some(&x2), Some(&y1), Some(&y2)) => {
            image::imageops::crop_imm(&mask, x1, y1, x2 - x1 + 1, y2 - y1 + 1).to_image()
        }
        _ => GrayImage::new(0, 0),
    }
}

/// Outcome of festival title recognition.
#[derive(Clone, Debug, PartialEq)]
pub enum FestTitleOutcome {
    Recognized {
        gender: Option<FestLabel>,
        level: Option<FestLabel>,
    },
    /// The yellow text was too narrow to split.
    TooNarrow,
    /// No recognizer exists for the game language.
    Unsupported(Option<Language>),
}

/// Classifies entries and runs the per-field recognizers.
#[derive(Clone, Debug)]
pub struct EntryClassifier {
    languages: Vec<Language>,
    recognizers: Recognizers,
}

impl EntryClassifier {
    pub fn new(languages: Vec<Language>, recognizers: Recognizers) -> Self {
        Self {
            languages,
            recognizers,
        }
    }

    pub fn recognizers(&self) -> &Recognizers {
        &self.recognizers
    }

    /// Builds the record for one slot. Recognizer failures are logged and
    /// leave their field empty.
    pub fn classify(&self, slot: usize, entry: &RgbImage) -> PlayerRecord {
        let is_self = is_self_entry(entry);
        let (rank_left, weapon_left, name_left) = if is_self {
            (RANK_LEFT_SELF, WEAPON_LEFT_SELF, NAME_LEFT_SELF)
        } else {
            (RANK_LEFT, WEAPON_LEFT, NAME_LEFT)
        };

        let name = crop(entry, PixelRect::new(name_left, 0, NAME_WIDTH, ENTRY_HEIGHT));
        let fest_title = crop(&name, PixelRect::new(0, 0, NAME_WIDTH, FEST_TITLE_HEIGHT));
        let fest_mask = festival_mask(&fest_title);
        let festival = is_festival_mask(&fest_mask);

        let score_p = crop(entry, PixelRect::new(SCORE_P_LEFT, 0, SCORE_P_WIDTH, ENTRY_HEIGHT));
        let mode = battle_mode(&score_p, festival);

        let images = EntryImages {
            rank: crop(
                entry,
                PixelRect::new(rank_left, RANK_TOP, RANK_WIDTH, ENTRY_HEIGHT - RANK_TOP),
            ),
            weapon: crop(entry, PixelRect::new(weapon_left, 0, WEAPON_WIDTH, ENTRY_HEIGHT)),
            name_normalized: normalize_name(&name),
            name,
            score: crop(entry, PixelRect::new(SCORE_LEFT, 0, SCORE_WIDTH, ENTRY_HEIGHT)),
            kills: crop(entry, PixelRect::new(KD_LEFT, 0, KD_WIDTH, KD_HEIGHT)),
            deaths: crop(entry, PixelRect::new(KD_LEFT, KD_HEIGHT, KD_WIDTH, KD_HEIGHT)),
            fest_title: festival.then_some(fest_title),
        };

        let fest = if festival {
            Some(self.fest_title(slot, &fest_mask))
        } else {
            None
        };

        let udemae = if mode == BattleMode::Ranked {
            self.recognize("udemae", slot, |r| match &r.udemae {
                Some(u) => u.match_udemae(&images.score),
                None => Ok(None),
            })
            .map(|u| u.to_uppercase())
        } else {
            None
        };

        let digits = |field: &str, img: &RgbImage| {
            self.recognize(field, slot, |r| match &r.digits {
                Some(d) => d.match_digits(img),
                None => Ok(None),
            })
        };
        let rank = digits("digits:rank", &images.rank);
        let kills = digits("digits:kills", &images.kills);
        let deaths = digits("digits:deaths", &images.deaths);
        let score = if mode == BattleMode::Turf {
            digits("digits:score", &images.score)
        } else {
            None
        };

        debug!(
            "Slot {}: self={} mode={:?} rank={:?} k/d={:?}/{:?}",
            slot, is_self, mode, rank, kills, deaths
        );

        PlayerRecord {
            slot,
            team: PlayerRecord::team_of(slot),
            rank_in_team: PlayerRecord::rank_in_team_of(slot),
            is_self,
            battle_mode: mode,
            rank,
            kills,
            deaths,
            score,
            weapon: None,
            udemae,
            fest,
            my_kills: 0,
            images,
        }
    }

    /// Runs one recognizer call, logging and swallowing its failure.
    fn recognize<T>(
        &self,
        name: &str,
        slot: usize,
        f: impl FnOnce(&Recognizers) -> anyhow::Result<Option<T>>,
    ) -> Option<T> {
        match f(&self.recognizers) {
            Ok(v) => v,
            Err(e) => {
                warn!("Slot {}: {}", slot, ScanError::recognizer(name, e));
                None
            }
        }
    }

    /// Festival title recognition, dispatched on the first game language
    /// that has a known title layout. `slot` only labels failures in the log.
    pub fn guess_fest_title(&self, slot: usize, mask: &GrayImage) -> FestTitleOutcome {
        let language = self.languages.iter().find(|l| !matches!(l, Language::Other(_)));
        match language {
            Some(Language::Japanese) => {}
            other => {
                debug!(
                    "Festival title recognition is not implemented for {:?}",
                    other
                );
                return FestTitleOutcome::Unsupported(other.cloned());
            }
        }

        let Some(parts) = split_fest_title(mask) else {
            return FestTitleOutcome::TooNarrow;
        };

        let gender = self.recognize("fest_gender", slot, |r| match &r.fest_gender {
            Some(g) => g.match_title(&parts.gender),
            None => Ok(None),
        });
        let level = self.recognize("fest_level", slot, |r| match &r.fest_level {
            Some(l) => l.match_title(&parts.level),
            None => Ok(None),
        });
        FestTitleOutcome::Recognized { gender, level }
    }

    fn fest_title(&self, slot: usize, mask: &GrayImage) -> FestTitle {
        match self.guess_fest_title(slot, mask) {
            FestTitleOutcome::Recognized { gender, level } => {
                let gender = gender.unwrap_or_default();
                let level = level.unwrap_or_default();
                FestTitle {
                    gender: gender.ja,
                    gender_en: gender.en,
                    prefix: level.ja,
                    prefix_en: level.en,
                }
            }
            outcome => {
                debug!("Slot {}: festival title not recognized: {:?}", slot, outcome);
                FestTitle::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ENTRY_WIDTH;
    use crate::recognition::recognizers::{DigitRecognizer, FestTitleRecognizer, UdemaeRecognizer};
    use crate::test_utils::{capture_log, captured_lines, render_entry, EntrySpec};
    use image::Rgb;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedDigits(u32);
    impl DigitRecognizer for FixedDigits {
        fn match_digits(&self, _img: &RgbImage) -> anyhow::Result<Option<u32>> {
            Ok(Some(self.0))
        }
    }

    struct FailingDigits;
    impl DigitRecognizer for FailingDigits {
        fn match_digits(&self, _img: &RgbImage) -> anyhow::Result<Option<u32>> {
            anyhow::bail!("engine crashed")
        }
    }

    #[derive(Default)]
    struct CountingUdemae(AtomicUsize);
    impl UdemaeRecognizer for CountingUdemae {
        fn match_udemae(&self, _img: &RgbImage) -> anyhow::Result<Option<String>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some("s+".to_string()))
        }
    }

    struct FailingTitle;
    impl FestTitleRecognizer for FailingTitle {
        fn match_title(&self, _mask: &GrayImage) -> anyhow::Result<Option<FestLabel>> {
            anyhow::bail!("model missing")
        }
    }

    struct FixedTitle(&'static str, &'static str);
    impl FestTitleRecognizer for FixedTitle {
        fn match_title(&self, _mask: &GrayImage) -> anyhow::Result<Option<FestLabel>> {
            Ok(Some(FestLabel {
                ja: Some(self.0.to_string()),
                en: Some(self.1.to_string()),
            }))
        }
    }

    fn classifier(recognizers: Recognizers) -> EntryClassifier {
        EntryClassifier::new(vec![Language::Japanese], recognizers)
    }

    #[test]
    fn test_self_detection() {
        let me = render_entry(&EntrySpec {
            is_self: true,
            ..Default::default()
        });
        let other = render_entry(&EntrySpec::default());
        assert!(is_self_entry(&me));
        assert!(!is_self_entry(&other));
    }

    #[test]
    fn test_self_threshold() {
        let mut entry = RgbImage::from_pixel(ENTRY_WIDTH, ENTRY_HEIGHT, Rgb([0, 0, 0]));
        // 193 bright pixels is not enough, 194 is.
        let mut n = 0;
        'fill: for y in 0..ENTRY_HEIGHT {
            for x in 0..43 {
                if n == 193 {
                    break 'fill;
                }
                entry.put_pixel(x, y, Rgb([255, 255, 255]));
                n += 1;
            }
        }
        assert!(!is_self_entry(&entry));
        entry.put_pixel(42, 44, Rgb([255, 255, 255]));
        assert!(is_self_entry(&entry));
    }

    #[test]
    fn test_battle_mode() {
        let turf = render_entry(&EntrySpec::default());
        let ranked = render_entry(&EntrySpec {
            turf: false,
            ..Default::default()
        });
        let c = classifier(Recognizers::default());
        assert_eq!(c.classify(0, &turf).battle_mode, BattleMode::Turf);
        assert_eq!(c.classify(0, &ranked).battle_mode, BattleMode::Ranked);

        let fest = render_entry(&EntrySpec {
            festival: true,
            ..Default::default()
        });
        let record = c.classify(0, &fest);
        assert_eq!(record.battle_mode, BattleMode::Festival);
        assert!(record.images.fest_title.is_some());
    }

    #[test]
    fn test_self_changes_sub_image_offsets() {
        let entry = RgbImage::from_fn(ENTRY_WIDTH, ENTRY_HEIGHT, |x, _| {
            Rgb([(x % 256) as u8, (x / 256) as u8, 0])
        });
        let c = classifier(Recognizers::default());
        let record = c.classify(5, &entry);
        assert!(!record.is_self);
        assert_eq!(record.images.weapon.get_pixel(0, 0)[0], 150);
        assert_eq!(record.images.name.get_pixel(0, 0)[0], 199);
        assert_eq!(record.images.rank.dimensions(), (43, 25));
        assert_eq!(record.images.kills.dimensions(), (31, 21));
        assert_eq!(record.team, 2);
        assert_eq!(record.rank_in_team, 2);

        let me = render_entry(&EntrySpec {
            is_self: true,
            ..Default::default()
        });
        let record = c.classify(1, &me);
        assert!(record.is_self);
        assert_eq!(record.images.weapon.dimensions(), (47, 45));
    }

    #[test]
    fn test_fields_follow_battle_mode() {
        let udemae = Arc::new(CountingUdemae::default());
        let c = classifier(Recognizers {
            digits: Some(Arc::new(FixedDigits(7))),
            udemae: Some(udemae.clone()),
            ..Default::default()
        });

        let turf = c.classify(0, &render_entry(&EntrySpec::default()));
        assert_eq!(turf.score, Some(7));
        assert_eq!(turf.udemae, None);
        assert_eq!(turf.rank, Some(7));

        let ranked = c.classify(
            0,
            &render_entry(&EntrySpec {
                turf: false,
                ..Default::default()
            }),
        );
        assert_eq!(ranked.score, None);
        assert_eq!(ranked.udemae.as_deref(), Some("S+"));
        assert_eq!(udemae.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recognizer_failure_leaves_field_empty() {
        let c = classifier(Recognizers {
            digits: Some(Arc::new(FailingDigits)),
            ..Default::default()
        });
        let record = c.classify(3, &render_entry(&EntrySpec::default()));
        assert_eq!(record.rank, None);
        assert_eq!(record.kills, None);
        assert_eq!(record.slot, 3);
    }

    #[test]
    fn test_festival_title_recognized_in_japanese() {
        let c = classifier(Recognizers {
            fest_gender: Some(Arc::new(FixedTitle("ガール", "girl"))),
            fest_level: Some(Arc::new(FixedTitle("まことの", "true"))),
            ..Default::default()
        });
        let record = c.classify(
            0,
            &render_entry(&EntrySpec {
                festival: true,
                ..Default::default()
            }),
        );
        let fest = record.fest.unwrap();
        assert_eq!(fest.gender.as_deref(), Some("ガール"));
        assert_eq!(fest.gender_en.as_deref(), Some("girl"));
        assert_eq!(fest.prefix.as_deref(), Some("まことの"));
        assert_eq!(fest.prefix_en.as_deref(), Some("true"));
    }

    #[test]
    fn test_festival_title_failure_names_its_slot() {
        capture_log();

        let c = classifier(Recognizers {
            fest_gender: Some(Arc::new(FailingTitle)),
            fest_level: Some(Arc::new(FixedTitle("まことの", "true"))),
            ..Default::default()
        });
        let record = c.classify(
            6,
            &render_entry(&EntrySpec {
                festival: true,
                ..Default::default()
            }),
        );

        let fest = record.fest.unwrap();
        assert_eq!(fest.gender, None);
        assert_eq!(fest.prefix.as_deref(), Some("まことの"));
        let lines = captured_lines();
        assert!(lines
            .iter()
            .any(|l| l.starts_with("Slot 6:") && l.contains("'fest_gender'")));
        assert!(!lines.iter().any(|l| l.starts_with("Slot 0:") && l.contains("fest_gender")));
    }

    #[test]
    fn test_festival_title_unsupported_language() {
        let mut mask = GrayImage::new(180, 23);
        for x in 10..100 {
            mask.put_pixel(x, 5, Luma([255]));
        }
        let english = EntryClassifier::new(
            vec![Language::Other("de".into()), Language::EnglishNA],
            Recognizers::default(),
        );
        assert_eq!(
            english.guess_fest_title(0, &mask),
            FestTitleOutcome::Unsupported(Some(Language::EnglishNA))
        );

        let unknown = EntryClassifier::new(vec![Language::Other("de".into())], Recognizers::default());
        assert_eq!(
            unknown.guess_fest_title(0, &mask),
            FestTitleOutcome::Unsupported(None)
        );
    }

    #[test]
    fn test_split_fest_title() {
        let mut mask = GrayImage::new(180, 23);
        for x in 20..120 {
            mask.put_pixel(x, 3, Luma([255]));
        }
        let parts = split_fest_title(&mask).unwrap();
        assert_eq!(parts.gender.dimensions(), (36, 23));
        assert_eq!(parts.level.dimensions(), (52, 23));
        assert_eq!(parts.level.get_pixel(0, 3)[0], 255);

        let mut narrow = GrayImage::new(180, 23);
        narrow.put_pixel(50, 0, Luma([255]));
        narrow.put_pixel(53, 0, Luma([255]));
        assert!(split_fest_title(&narrow).is_none());
        assert!(split_fest_title(&GrayImage::new(180, 23)).is_none());
    }

    #[test]
    fn test_normalize_name_trims() {
        let mut name = RgbImage::new(180, 45);
        for x in 30..40 {
            for y in 10..20 {
                name.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let n = normalize_name(&name);
        assert_eq!(n.dimensions(), (10, 10));
        assert_eq!(normalize_name(&RgbImage::new(5, 5)).dimensions(), (0, 0));
    }
}
