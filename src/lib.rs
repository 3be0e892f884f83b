//! Scoreboard scanner
//!
//! Watches a stream of captured 1280×720 frames for the post-match
//! scoreboard, waits for its entrance animation to settle, corrects capture
//! misalignment (pixel offset, letterboxing, perspective skew) and slices the
//! eight player rows into per-player records for downstream recognizers.

pub mod analysis;
pub mod config;
pub mod entries;
pub mod error;
pub mod events;
pub mod filters;
pub mod geometry;
pub mod layout;
pub mod locale;
pub mod logging;
pub mod matcher;
pub mod paths;
pub mod recognition;
pub mod result;
pub mod scene;

#[cfg(test)]
mod test_utils;

pub use config::ScanConfig;
pub use error::{ScanError, ScanResult};
pub use events::{create_event_queue, ScanEvent};
pub use result::GameResult;
pub use scene::{SceneState, ScoreboardScene, Tick};
