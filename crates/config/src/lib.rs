// Configuration loading

pub mod ai;
pub mod settings;

use std::path::PathBuf;

/// Per-user configuration directory (`~/.config/rosterlink` on Linux).
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rosterlink")
}
