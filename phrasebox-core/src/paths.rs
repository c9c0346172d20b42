//! Per-user file locations.

use std::path::PathBuf;

const APP_DIR: &str = "phrasebox";

/// `<config dir>/phrasebox`, if the platform has a config dir.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Default location of the saved session state.
pub fn default_state_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("state.bin")
}

/// Log file location.
pub fn log_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phrasebox.log")
}
