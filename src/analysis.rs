//! The full analysis pass over a still scoreboard.
//!
//! normalize → slice entries (with re-slicing) → classify each slot →
//! aggregate into a [`GameResult`].

use image::{GrayImage, RgbImage};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;

use crate::entries::{extract_entries, extract_settled, marker_spread, EntryClassifier};
use crate::events::ScanEvent;
use crate::geometry::{select_best, Corrector};
use crate::layout::{LOWER_TEAM_COLOR_AT, UPPER_TEAM_COLOR_AT};
use crate::result::{GameResult, KillRecord, PlayerRecord, TeamColor};

/// Team colors as (my team, counter team).
///
/// The winning team is listed on top. Without a self row the upper team is
/// assumed to be mine.
pub fn team_colors(frame: &RgbImage, won: Option<bool>) -> (TeamColor, TeamColor) {
    let sample = |(x, y): (u32, u32)| {
        let x = x.min(frame.width().saturating_sub(1));
        let y = y.min(frame.height().saturating_sub(1));
        TeamColor::from_pixel(frame.get_pixel(x, y))
    };
    let upper = sample(UPPER_TEAM_COLOR_AT);
    let lower = sample(LOWER_TEAM_COLOR_AT);
    match won {
        Some(false) => (lower, upper),
        _ => (upper, lower),
    }
}

/// Whether I won: true if my row is in the upper team.
pub fn won_from_players(players: &[PlayerRecord]) -> Option<bool> {
    players.iter().find(|p| p.is_self).map(|p| p.team == 1)
}

pub struct Analyzer {
    corrector: Corrector,
    classifier: EntryClassifier,
}

impl Analyzer {
    pub fn new(corrector: Corrector, classifier: EntryClassifier) -> Self {
        Self {
            corrector,
            classifier,
        }
    }

    pub fn classifier(&self) -> &EntryClassifier {
        &self.classifier
    }

    /// Marker spread of the normalized frame on the plain grid. Reports
    /// nothing to the event sink.
    pub fn measure_spread(&self, frame: &RgbImage) -> u32 {
        let normalized = match select_best(self.corrector.hypotheses(frame)) {
            Some(best) => best.frame,
            None => frame.clone(),
        };
        marker_spread(&extract_entries(&normalized))
    }

    /// Runs the analysis pass. Weapons and kill attribution are left for
    /// the weapon stage.
    pub fn analyze(
        &self,
        frame: &RgbImage,
        kill_names: Vec<GrayImage>,
        events: &Sender<ScanEvent>,
    ) -> GameResult {
        let normalized = self.corrector.correct(frame, events);
        let grid = extract_settled(&normalized.frame);
        if grid.passes > 0 {
            info!(
                "Last entry still sliding: spread {} -> {} after {} re-slices",
                grid.initial_spread, grid.final_spread, grid.passes
            );
        }

        let players: Vec<PlayerRecord> = grid
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| self.classifier.classify(slot, entry))
            .collect();

        let won = won_from_players(&players);
        let (my_team_color, counter_team_color) = team_colors(&normalized.frame, won);
        let is_fest = players.iter().any(|p| p.fest.is_some());
        debug!("Analysis: won={:?} fest={}", won, is_fest);

        GameResult {
            won,
            is_fest,
            my_team_color,
            counter_team_color,
            players,
            kills: kill_names
                .into_iter()
                .map(|name_image| KillRecord {
                    name_image,
                    player_slot: None,
                })
                .collect(),
            kills_per_weapon: BTreeMap::new(),
            scoreboard: frame.clone(),
        }
    }
}
