use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::ManagerSnapshot;

/// Writes a manager snapshot as pretty JSON.
pub fn save_snapshot(path: &Path, snapshot: &ManagerSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let content = serde_json::to_string_pretty(snapshot)
        .with_context(|| "Failed to serialize zone snapshot")?;

    // Write to a temporary file first, then rename over the target.
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write zone snapshot to {}", temp_path.display()))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {} to {}", temp_path.display(), path.display()))?;

    log::info!("Saved {} zone instances to {}", snapshot.instances.len(), path.display());
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<ManagerSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read zone snapshot from {}", path.display()))?;

    let snapshot: ManagerSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse zone snapshot {}", path.display()))?;

    log::info!("Loaded {} zone instances from {}", snapshot.instances.len(), path.display());
    Ok(snapshot)
}
