//! Scanner configuration.
//!
//! Loaded from config.json next to the executable (or an explicit path).
//! Missing or broken files fall back to defaults; the reason is logged.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::locale::Language;
use crate::paths;

/// Complete scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Game languages in order of preference; picks the mask and the
    /// festival title recognizer.
    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,
    /// Directory holding `result_detail.png` and per-language variants
    #[serde(default = "paths::get_masks_dir")]
    pub masks_dir: PathBuf,
    /// Persisted reference feature model
    #[serde(default = "paths::get_model_path")]
    pub model_path: PathBuf,
    /// Image the reference model is rebuilt from
    #[serde(default = "paths::get_reference_image_path")]
    pub reference_image: PathBuf,
    /// Enables the feature-based perspective hypothesis
    #[serde(default = "default_true")]
    pub perspective_correction: bool,
    /// Runs weapon recognition on a worker thread instead of the tick thread
    #[serde(default)]
    pub background_weapon_recognition: bool,
    /// error / warn / info / debug / trace
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_languages() -> Vec<Language> {
    vec![Language::Japanese]
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            masks_dir: paths::get_masks_dir(),
            model_path: paths::get_model_path(),
            reference_image: paths::get_reference_image_path(),
            perspective_correction: default_true(),
            background_weapon_recognition: false,
            log_level: default_log_level(),
        }
    }
}

/// `<exe_dir>/config.json`
pub fn default_config_path() -> PathBuf {
    paths::get_exe_dir().join("config.json")
}

impl ScanConfig {
    /// Loads configuration from `path`, or returns defaults.
    pub fn load(path: &Path) -> Self {
        info!("Looking for config at: {}", path.display());

        if !path.exists() {
            info!("{} not found. Using default config.", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// `log_level` as a filter; unknown names mean `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
