//! Console and file logger behind the `log` facade.
//!
//! Every line is `[HH:MM:SS.mmm] LEVEL message`, printed and appended to
//! `<exe_dir>/logs/scoreboard_scan.log`.

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::paths;

const LOG_FILE_NAME: &str = "scoreboard_scan.log";

struct ScanLogger;

static LOGGER: ScanLogger = ScanLogger;

fn log_path() -> PathBuf {
    paths::get_logs_dir().join(LOG_FILE_NAME)
}

/// Formats one log line with a local timestamp.
pub fn format_line(level: log::Level, msg: &std::fmt::Arguments) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    format!("[{}] {:<5} {}\n", timestamp, level, msg)
}

impl Log for ScanLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.args());
        print!("{}", line);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path()) {
            let _ = file.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Installs the logger. Call once at startup.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Changes the level after configuration is loaded.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
