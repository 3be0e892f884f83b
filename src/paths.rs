//! Locations of runtime assets and outputs, all relative to the executable.

use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the mask asset directory: `<exe_dir>/masks/`
pub fn get_masks_dir() -> PathBuf {
    get_exe_dir().join("masks")
}

/// Returns the reference data directory: `<exe_dir>/data/`
pub fn get_data_dir() -> PathBuf {
    get_exe_dir().join("data")
}

/// Default location of the persisted reference feature model.
pub fn get_model_path() -> PathBuf {
    get_data_dir().join("result_detail_features.model.json")
}

/// Default location of the bundled image the reference model is built from.
pub fn get_reference_image_path() -> PathBuf {
    get_data_dir().join("result_detail_features.png")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_data_dir())?;
    Ok(())
}
