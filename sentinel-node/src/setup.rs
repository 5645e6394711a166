use std::{fs, path::Path};

use tracing::info;

use sentinel_common::Result;

use crate::config::Config;

/// Writes the default config to `path` unless a file is already there.
///
/// Returns `true` when a new file was generated.
pub fn ensure_config<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }

    info!("⚠️ Config not found. Generating defaults at {}...", path.display());
    write_default_config(path)?;
    info!("✅ Config generated");
    Ok(true)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut config = Config::default();
    if let Some(stem) = run_name(path) {
        config.name = stem;
    }
    config.save_to_file(path)
}

/// Name of a run derived from its config location: the enclosing directory
/// for `nodes/<name>/config.json` style layouts, else the file stem.
pub fn run_name(config_path: &Path) -> Option<String> {
    let stem = config_path.file_stem()?.to_str()?;
    if stem != "config" {
        return Some(stem.to_string());
    }
    config_path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
