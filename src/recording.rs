use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;


pub fn recording_file_name(at: DateTime<Local>) -> String {
    format!("polar_h10_data_{}.bin", at.format("%Y%m%d_%H%M%S"))
}

/// Writes the raw notification bytes to a timestamped file under `dir`.
pub fn save_recording(dir: &Path, data: &[u8], at: DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(recording_file_name(at));
    fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), bytes = data.len(), "saved recording");
    Ok(path)
}
