//! Run settings with persistence
//!
//! Settings are read from `~/.config/delve/settings.toml`, or from a path
//! given on the command line.

use std::fs;
use std::path::{Path, PathBuf};

use delve_ecs::EcsConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// All run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// RNG seed for spawning and AI
    pub seed: u64,
    /// Number of turn-entity cycles to simulate
    pub turns: u32,
    /// Monsters spawned at start
    pub monsters: u32,
    /// Map width in tiles
    pub map_width: u16,
    /// Map height in tiles
    pub map_height: u16,
    /// Delay added per action and per turn cycle
    pub turn_interval: i16,
    /// Substrate tuning
    pub ecs: EcsConfig,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            seed: 0x00C0_FFEE,
            turns: 200,
            monsters: 6,
            map_width: 24,
            map_height: 16,
            turn_interval: 100,
            ecs: EcsConfig::default(),
        }
    }
}

impl GameSettings {
    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("delve").join("settings.toml"))
    }

    /// Load settings from `path`, or the default location, falling back to
    /// defaults if the file is missing or malformed
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let Some(path) = Self::settings_path() else {
                    warn!("Could not determine config directory");
                    return Self::default();
                };
                path
            }
        };

        if !path.exists() {
            info!("No settings file at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = GameSettings::parse(
            r#"
            seed = 7
            monsters = 2

            [ecs]
            max_parent_depth = 16
            "#,
        )
        .unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.monsters, 2);
        assert_eq!(settings.turn_interval, 100);
        assert_eq!(settings.ecs.max_parent_depth, 16);
        assert_eq!(settings.ecs.capacity, delve_ecs::MAX_ENTITIES);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings = GameSettings::load(Some(Path::new("/nonexistent/delve/settings.toml")));
        assert_eq!(settings.turns, GameSettings::default().turns);
    }
}
