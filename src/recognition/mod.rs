//! Recognizer seams and the steps that run them.
//!
//! This module provides:
//! - Traits for the digit, rank, festival, weapon and name recognizers
//! - Weapon recognition, inline or on a worker thread
//! - Kill attribution to counter-team players

pub mod kills;
pub mod recognizers;
pub mod weapons;

pub use kills::analyze_kills;
pub use recognizers::Recognizers;
pub use weapons::{finish_result, WeaponWorker};
