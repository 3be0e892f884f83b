//! Attribution of my kills to counter-team players.

use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::error::ScanError;
use crate::recognition::recognizers::PlayerNameClassifier;
use crate::result::{GameResult, KillRecord, PlayerRecord};

/// Weapon key used when the victim's weapon is unknown.
pub const UNKNOWN_WEAPON: &str = "unknown";

/// Matches each kill-feed name image against the counter team's normalized
/// names. Needs a self row to know which team is the counter team.
pub fn attribute_kills(
    players: &[PlayerRecord],
    kills: &mut [KillRecord],
    classifier: &dyn PlayerNameClassifier,
) {
    let Some(me) = players.iter().find(|p| p.is_self) else {
        debug!("Kill attribution skipped: no self row");
        return;
    };

    let counter_team: Vec<&PlayerRecord> = players.iter().filter(|p| p.team != me.team).collect();
    let names: Vec<_> = counter_team
        .iter()
        .map(|p| p.images.name_normalized.clone())
        .collect();

    for (index, kill) in kills.iter_mut().enumerate() {
        match classifier.predict(&names, &kill.name_image) {
            Ok(Some(i)) if i < counter_team.len() => {
                debug!("My kill {} -> slot {}", index, counter_team[i].slot);
                kill.player_slot = Some(counter_team[i].slot);
            }
            Ok(_) => {}
            Err(e) => warn!("Kill {}: {}", index, ScanError::recognizer("player_name", e)),
        }
    }
}

/// Number of my kills per victim weapon.
pub fn kills_per_weapon(players: &[PlayerRecord], kills: &[KillRecord]) -> BTreeMap<String, u32> {
    let mut tally = BTreeMap::new();
    for slot in kills.iter().filter_map(|k| k.player_slot) {
        let Some(victim) = players.iter().find(|p| p.slot == slot) else {
            continue;
        };
        let weapon = victim.weapon.clone().unwrap_or_else(|| UNKNOWN_WEAPON.to_string());
        *tally.entry(weapon).or_insert(0) += 1;
    }
    tally
}

/// Adds each attributed kill to the victim's `my_kills`.
pub fn tally_my_kills(players: &mut [PlayerRecord], kills: &[KillRecord]) {
    for slot in kills.iter().filter_map(|k| k.player_slot) {
        if let Some(victim) = players.iter_mut().find(|p| p.slot == slot) {
            victim.my_kills += 1;
        }
    }
}

/// Runs attribution and both tallies on a finished result.
pub fn analyze_kills(result: &mut GameResult, classifier: &dyn PlayerNameClassifier) {
    attribute_kills(&result.players, &mut result.kills, classifier);
    result.kills_per_weapon = kills_per_weapon(&result.players, &result.kills);
    tally_my_kills(&mut result.players, &result.kills);
    info!("Kills per weapon: {:?}", result.kills_per_weapon);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::BattleMode;
    use crate::test_utils::blank_images;
    use image::{GrayImage, Luma};

    /// Predicts the candidate whose width equals the query's width.
    struct WidthClassifier;
    impl PlayerNameClassifier for WidthClassifier {
        fn predict(&self, candidates: &[GrayImage], name: &GrayImage) -> anyhow::Result<Option<usize>> {
            if name.width() == 99 {
                anyhow::bail!("unreadable");
            }
            Ok(candidates.iter().position(|c| c.width() == name.width()))
        }
    }

    fn players() -> Vec<PlayerRecord> {
        (0..8)
            .map(|slot| {
                let mut images = blank_images();
                images.name_normalized = GrayImage::from_pixel(10 + slot as u32, 5, Luma([255]));
                PlayerRecord {
                    slot,
                    team: PlayerRecord::team_of(slot),
                    rank_in_team: PlayerRecord::rank_in_team_of(slot),
                    is_self: slot == 2,
                    battle_mode: BattleMode::Turf,
                    rank: None,
                    kills: None,
                    deaths: None,
                    score: None,
                    weapon: (slot != 6).then(|| format!("weapon{}", slot % 2)),
                    udemae: None,
                    fest: None,
                    my_kills: 0,
                    images,
                }
            })
            .collect()
    }

    fn kill(width: u32) -> KillRecord {
        KillRecord {
            name_image: GrayImage::new(width, 5),
            player_slot: None,
        }
    }

    #[test]
    fn test_attribute_kills_to_counter_team() {
        let players = players();
        // Widths 15, 17 -> slots 5, 7; 11 belongs to my own team; 99 errors.
        let mut kills = vec![kill(15), kill(17), kill(11), kill(99), kill(15)];
        attribute_kills(&players, &mut kills, &WidthClassifier);

        let slots: Vec<_> = kills.iter().map(|k| k.player_slot).collect();
        assert_eq!(slots, vec![Some(5), Some(7), None, None, Some(5)]);
    }

    #[test]
    fn test_tallies() {
        let mut players = players();
        let kills = vec![
            KillRecord { player_slot: Some(5), ..kill(1) },
            KillRecord { player_slot: Some(5), ..kill(1) },
            KillRecord { player_slot: Some(6), ..kill(1) },
            KillRecord { player_slot: Some(4), ..kill(1) },
        ];

        let per_weapon = kills_per_weapon(&players, &kills);
        assert_eq!(per_weapon.get("weapon1"), Some(&2));
        assert_eq!(per_weapon.get("weapon0"), Some(&1));
        assert_eq!(per_weapon.get(UNKNOWN_WEAPON), Some(&1));

        tally_my_kills(&mut players, &kills);
        assert_eq!(players[5].my_kills, 2);
        assert_eq!(players[6].my_kills, 1);
        assert_eq!(players[0].my_kills, 0);
    }

    #[test]
    fn test_no_self_row_skips_attribution() {
        let mut players = players();
        players[2].is_self = false;
        let mut kills = vec![kill(15)];
        attribute_kills(&players, &mut kills, &WidthClassifier);
        assert_eq!(kills[0].player_slot, None);
    }
}
