//! `rosterlink cache` — inspect or clear the correspondence cache.

use std::path::PathBuf;

use rosterlink_config::settings::Settings;
use rosterlink_merge::{MappingCache, MappingStore};

use crate::CliError;

fn cache_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| Settings::load().effective_cache_path())
}

pub fn cmd_cache_show(path: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let path = cache_path(path);
    let cache = MappingCache::open(&path);
    let entries = cache.summary();

    if json {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "entries": entries,
        });
        let out = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    eprintln!("{}: {} entries", path.display(), entries.len());
    for entry in &entries {
        println!("{}", entry.key);
        println!(
            "    {}  (updated {})",
            entry.mapping_types.join(", "),
            entry.last_updated.as_deref().unwrap_or("unknown"),
        );
    }
    Ok(())
}

pub fn cmd_cache_clear(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = cache_path(path);
    let mut cache = MappingCache::open(&path);
    let removed = cache.len();
    cache
        .clear()
        .map_err(|e| CliError::io(e.to_string()))?;
    eprintln!("cleared {removed} entries from {}", path.display());
    Ok(())
}
