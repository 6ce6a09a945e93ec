//! Configuration file and application paths
//!
//! The JSON config holds four optional sections: `sets`, `cache`, `player`,
//! `director`. Missing sections and fields take their defaults.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::asset_cache::CacheOptions;
use crate::core::director::DirectorSettings;
use crate::core::player::PlayerSettings;
use crate::core::sequence::SequenceSet;

/// Default config file name inside the config directory
pub const CONFIG_FILE: &str = "flipbook.json";
/// Default log file name inside the data directory
pub const LOG_FILE: &str = "flipbook.log";

const APP_DIR: &str = "flipbook";
const CONFIG_DIR_ENV: &str = "FLIPBOOK_CONFIG_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipbookConfig {
    pub sets: Vec<SequenceSet>,
    pub cache: CacheOptions,
    pub player: PlayerSettings,
    pub director: DirectorSettings,
}

impl FlipbookConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid flipbook config")
    }

    pub fn from_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Load `path`, or fall back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::from_json(path)?;
        info!("Loaded config {} ({} sets)", path.display(), config.sets.len());
        Ok(config)
    }

    pub fn to_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

/// Overrides for the default application paths
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI arg -> ENV var (FLIPBOOK_CONFIG_DIR) -> None (platform defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file.
///
/// Platform paths:
/// - Linux: ~/.config/flipbook/{name}
/// - macOS: ~/Library/Application Support/flipbook/{name}
/// - Windows: %APPDATA%\flipbook\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    config_dir(config).join(name)
}

/// Path to a data file (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    data_dir(config).join(name)
}

/// Create the config and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = config_dir(config);
    let data_dir = data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }
    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }
    Ok(())
}

fn config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    dirs_next::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    dirs_next::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "sets": [
                { "name": "Fish", "address_template": "fish/chunk{0:00}", "total_chunks": 3,
                  "fps": 30, "frames_per_chunk": 120, "start_at_zero": true }
            ],
            "cache": { "track_owners": false, "auto_log_interval_secs": 2.0 },
            "player": { "loop_playback": false, "preload_threshold_frames": 10 },
            "director": { "players": 4, "set_ranges": [[0, 0], [0, 2]], "auto_start": false }
        }"#;
        let config = FlipbookConfig::from_json_str(json).unwrap();

        assert_eq!(config.sets.len(), 1);
        assert_eq!(config.sets[0].total_chunks, 3);
        assert!(!config.cache.track_owners);
        assert!(config.cache.detailed_log);
        assert!(!config.player.loop_playback);
        assert_eq!(config.player.fps, 30);
        assert_eq!(config.director.set_ranges, vec![(0, 0), (0, 2)]);
        assert_eq!(config.director.start_delay_secs, 0.0);
    }

    #[test]
    fn test_empty_and_partial_configs_use_defaults() {
        assert_eq!(FlipbookConfig::from_json_str("{}").unwrap(), FlipbookConfig::default());

        let config = FlipbookConfig::from_json_str(r#"{ "sets": [ { "name": "Bubbles" } ] }"#).unwrap();
        assert_eq!(config.sets[0].name, "Bubbles");
        assert_eq!(config.sets[0].frames_per_chunk, 120);
        assert!(FlipbookConfig::from_json_str("{ sets: }").is_err());
    }

    #[test]
    fn test_file_round_trip_and_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        assert_eq!(FlipbookConfig::load_or_default(&path).unwrap(), FlipbookConfig::default());

        let mut config = FlipbookConfig::default();
        config.sets.push(SequenceSet::default());
        config.director.players = 5;
        config.to_json(&path).unwrap();
        assert_eq!(FlipbookConfig::load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn test_custom_dir_paths() {
        let paths = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file(CONFIG_FILE, &paths), PathBuf::from("/custom/flipbook.json"));
        assert_eq!(data_file(LOG_FILE, &paths), PathBuf::from("/custom/flipbook.log"));

        let default = config_file(CONFIG_FILE, &PathConfig { config_dir: None });
        assert!(default.to_string_lossy().contains("flipbook"));
    }

    #[test]
    fn test_ensure_dirs_creates_custom_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("cfg");
        ensure_dirs(&PathConfig {
            config_dir: Some(dir.clone()),
        })
        .unwrap();
        assert!(dir.is_dir());
    }
}
