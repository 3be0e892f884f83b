//! Recognition collaborators.
//!
//! The scan pipeline only cuts sub-images; turning them into digits, ranks,
//! festival titles, weapons or player identities is delegated to these
//! traits. Every call is fallible, and a failure only empties the field it
//! was meant to fill.

use image::{GrayImage, RgbImage};
use std::sync::Arc;

/// Reads a small number (rank, kills, deaths, turf score).
pub trait DigitRecognizer: Send + Sync {
    fn match_digits(&self, img: &RgbImage) -> anyhow::Result<Option<u32>>;
}

/// Reads a ranked-battle grade badge such as "s+" or "a-".
pub trait UdemaeRecognizer: Send + Sync {
    fn match_udemae(&self, img: &RgbImage) -> anyhow::Result<Option<String>>;
}

/// A festival title fragment in its localized and English forms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FestLabel {
    pub ja: Option<String>,
    pub en: Option<String>,
}

/// Classifies one part of a festival title (gender or level) from its
/// binary mask.
pub trait FestTitleRecognizer: Send + Sync {
    fn match_title(&self, mask: &GrayImage) -> anyhow::Result<Option<FestLabel>>;
}

/// Identifies weapons from the weapon icons of all 8 slots at once.
/// The returned list is aligned with the input; it may be shorter.
pub trait WeaponRecognizer: Send + Sync {
    fn name(&self) -> &str;
    fn recognize_weapons(&self, icons: &[RgbImage]) -> anyhow::Result<Vec<Option<String>>>;
}

/// Picks which of `candidates` (normalized player name images) a kill-feed
/// name image shows.
pub trait PlayerNameClassifier: Send + Sync {
    fn predict(&self, candidates: &[GrayImage], name: &GrayImage) -> anyhow::Result<Option<usize>>;
}

/// The recognizers available to an analysis pass. Any of them may be absent.
#[derive(Clone, Default)]
pub struct Recognizers {
    pub digits: Option<Arc<dyn DigitRecognizer>>,
    pub udemae: Option<Arc<dyn UdemaeRecognizer>>,
    pub fest_gender: Option<Arc<dyn FestTitleRecognizer>>,
    pub fest_level: Option<Arc<dyn FestTitleRecognizer>>,
    pub weapons_local: Option<Arc<dyn WeaponRecognizer>>,
    pub weapons_remote: Option<Arc<dyn WeaponRecognizer>>,
    pub player_names: Option<Arc<dyn PlayerNameClassifier>>,
}

impl std::fmt::Debug for Recognizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizers")
            .field("digits", &self.digits.is_some())
            .field("udemae", &self.udemae.is_some())
            .field("fest_gender", &self.fest_gender.is_some())
            .field("fest_level", &self.fest_level.is_some())
            .field("weapons_local", &self.weapons_local.is_some())
            .field("weapons_remote", &self.weapons_remote.is_some())
            .field("player_names", &self.player_names.is_some())
            .finish()
    }
}
