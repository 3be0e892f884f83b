//! Game result data model.

use image::{GrayImage, Rgb, RgbImage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::filters::{rgb_to_hsv, Hsv};
use crate::layout::SLOTS_PER_TEAM;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleMode {
    Turf,
    Ranked,
    Festival,
}

/// Sub-images cut from one entry, handed to recognizers.
#[derive(Clone, Debug)]
pub struct EntryImages {
    pub rank: RgbImage,
    pub weapon: RgbImage,
    pub name: RgbImage,
    /// White-text mask of the name, trimmed to its content.
    pub name_normalized: GrayImage,
    pub score: RgbImage,
    pub kills: RgbImage,
    pub deaths: RgbImage,
    pub fest_title: Option<RgbImage>,
}

/// Festival title of one player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FestTitle {
    pub gender: Option<String>,
    pub gender_en: Option<String>,
    pub prefix: Option<String>,
    pub prefix_en: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerRecord {
    pub slot: usize,
    pub team: u8,
    pub rank_in_team: u8,
    pub is_self: bool,
    pub battle_mode: BattleMode,
    pub rank: Option<u32>,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
    pub score: Option<u32>,
    pub weapon: Option<String>,
    pub udemae: Option<String>,
    pub fest: Option<FestTitle>,
    pub my_kills: u32,
    #[serde(skip)]
    pub images: EntryImages,
}

impl PlayerRecord {
    /// Team number of a slot: 1 for the upper four rows, 2 for the lower.
    pub fn team_of(slot: usize) -> u8 {
        if slot < SLOTS_PER_TEAM { 1 } else { 2 }
    }

    /// 1-based position of a slot within its team.
    pub fn rank_in_team_of(slot: usize) -> u8 {
        (slot % SLOTS_PER_TEAM) as u8 + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TeamColor {
    pub rgb: [u8; 3],
    pub hsv: Hsv,
}

impl TeamColor {
    pub fn from_pixel(pixel: &Rgb<u8>) -> Self {
        Self {
            rgb: pixel.0,
            hsv: rgb_to_hsv(pixel),
        }
    }
}

/// One of my kills as shown in the kill feed.
#[derive(Clone, Debug, Serialize)]
pub struct KillRecord {
    #[serde(skip)]
    pub name_image: GrayImage,
    /// Slot of the counter-team player this kill was attributed to.
    pub player_slot: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameResult {
    pub won: Option<bool>,
    pub is_fest: bool,
    pub my_team_color: TeamColor,
    pub counter_team_color: TeamColor,
    pub players: Vec<PlayerRecord>,
    pub kills: Vec<KillRecord>,
    pub kills_per_weapon: BTreeMap<String, u32>,
    #[serde(skip)]
    pub scoreboard: RgbImage,
}

impl GameResult {
    pub fn me(&self) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.is_self)
    }

    /// Human-readable dump: one header line, then one line per player.
    pub fn summary(&self) -> String {
        let won = match self.won {
            Some(true) => "win",
            Some(false) => "lose",
            None => "unknown",
        };

        let mut out = String::new();
        let _ = writeln!(out, "result {} fest {}", won, self.is_fest);
        let _ = writeln!(out, "--------");
        for p in &self.players {
            let (prefix, gender) = match &p.fest {
                Some(f) => (
                    f.prefix.as_deref().unwrap_or("").replace('の', ""),
                    f.gender.clone().unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            };
            let _ = writeln!(
                out,
                "team {} rank_in_team {} rank {} udemae {} {}/{} weapon {} score {} {}{} {}",
                p.team,
                p.rank_in_team,
                show(&p.rank),
                show(&p.udemae),
                show(&p.kills),
                show(&p.deaths),
                show(&p.weapon),
                show(&p.score),
                prefix,
                gender,
                if p.is_self { "*" } else { "" },
            );
        }
        let _ = writeln!(out, "--------");
        out
    }
}

fn show<T: std::fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "None".to_string(),
    }
}
