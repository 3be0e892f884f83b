//! Player entry slicing and classification.
//!
//! This module provides:
//! - Fixed-row entry extraction with last-row re-slicing
//! - Marker alignment used to detect the settled scoreboard
//! - Per-entry field classification and sub-image cutting

pub mod classifier;
pub mod grid;
pub mod stability;

pub use classifier::EntryClassifier;
pub use grid::{extract_entries, extract_settled, EntryGrid};
pub use stability::{marker_spread, SpreadHistory};
