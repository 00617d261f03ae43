use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};

use crate::models::Screenshot;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Screenshots found directly inside `dir`, ordered by capture time.
///
/// The capture time is the file stem when it is an integer (epoch seconds),
/// otherwise the file's modification time.
pub fn collect_screenshots(dir: &Path) -> Result<Vec<Screenshot>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut screenshots = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();

        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_image || !path.is_file() {
            continue;
        }

        let captured_at = match stem_timestamp(&path) {
            Some(ts) => ts,
            None => modified_timestamp(&path)?,
        };
        screenshots.push(Screenshot::new(captured_at, path));
    }

    screenshots.sort_by_key(|shot| shot.captured_at);
    Ok(screenshots)
}

fn stem_timestamp(path: &Path) -> Option<i64> {
    path.file_stem()?.to_str()?.parse().ok()
}

fn modified_timestamp(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("failed to read modification time of {}", path.display()))?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .with_context(|| format!("{} was modified before 1970", path.display()))?
        .as_secs();
    i64::try_from(secs).context("modification time out of range")
}
