use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INSTANCE_MAX_AGE_MS: u64 = 3_600_000;
pub const DEFAULT_REVEAL_RADIUS: i32 = 1;

/// Runtime settings for the zone manager and the command-line front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Instances older than this are dropped by a cleanup sweep.
    pub instance_max_age_ms: u64,
    /// Chebyshev radius uncovered around each cell the player enters.
    pub reveal_radius: i32,
    pub default_seed: Option<u64>,
    /// Extra templates registered on top of the built-in set.
    pub templates_path: Option<PathBuf>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            instance_max_age_ms: DEFAULT_INSTANCE_MAX_AGE_MS,
            reveal_radius: DEFAULT_REVEAL_RADIUS,
            default_seed: None,
            templates_path: None,
        }
    }
}

impl ZoneConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: ZoneConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .with_context(|| "Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ZoneConfig::load(&dir.path().join("delve.json")).unwrap();
        assert_eq!(config, ZoneConfig::default());
        assert_eq!(config.instance_max_age_ms, 3_600_000);
        assert_eq!(config.reveal_radius, 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delve.json");
        fs::write(&path, r#"{ "default_seed": 42 }"#).unwrap();

        let config = ZoneConfig::load(&path).unwrap();
        assert_eq!(config.default_seed, Some(42));
        assert_eq!(config.reveal_radius, DEFAULT_REVEAL_RADIUS);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delve.json");
        let config = ZoneConfig {
            reveal_radius: 2,
            templates_path: Some(PathBuf::from("extra.json")),
            ..ZoneConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ZoneConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delve.json");
        fs::write(&path, "not json").unwrap();
        assert!(ZoneConfig::load(&path).is_err());
    }
}
