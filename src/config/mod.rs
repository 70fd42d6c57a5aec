//! Application configuration loaded from `config.toml`.
//!
//! Every field has a default, so the bot runs with no file at all. The file
//! location can be overridden with `LOOT_BUDDY_CONFIG`.

/// Storage backend selection and `SQLite` table creation
pub mod database;

use crate::core::{generator::GeneratorSettings, session::SessionSettings};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_VAR: &str = "LOOT_BUDDY_CONFIG";
/// Config file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Whole `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[storage]`
    pub storage: StorageConfig,
    /// `[gathering]`
    pub gathering: GatheringConfig,
    /// `[generator]`
    pub generator: GeneratorConfig,
    /// `[inventory]`
    pub inventory: InventoryConfig,
}

/// Where profiles are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per domain under `data_dir`
    #[default]
    Json,
    /// `profile_records` table behind `database_url`
    Sqlite,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend
    pub backend: StorageBackend,
    /// Directory of the JSON files
    pub data_dir: PathBuf,
    /// `SQLite` URL, `DATABASE_URL` takes precedence
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            data_dir: PathBuf::from("data"),
            database_url: "sqlite://data/loot_buddy.sqlite?mode=rwc".to_string(),
        }
    }
}

impl StorageConfig {
    /// Database URL after applying the `DATABASE_URL` override.
    #[must_use]
    pub fn resolved_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database_url.clone())
    }
}

/// `[gathering]` section, all values in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatheringConfig {
    /// Hard session length
    pub session_secs: u64,
    /// Idle window before a session is dropped
    pub inactivity_secs: u64,
    /// Length of the starting screen
    pub start_delay_secs: u64,
}

impl Default for GatheringConfig {
    fn default() -> Self {
        Self {
            session_secs: 300,
            inactivity_secs: 30,
            start_delay_secs: 3,
        }
    }
}

impl From<GatheringConfig> for SessionSettings {
    fn from(config: GatheringConfig) -> Self {
        Self {
            duration: Duration::from_secs(config.session_secs),
            inactivity: Duration::from_secs(config.inactivity_secs),
            start_delay: Duration::from_secs(config.start_delay_secs),
        }
    }
}

/// `[generator]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Coins per minute before multipliers
    pub rate_per_minute: u64,
    /// Cooldown after a stop, seconds
    pub cooldown_secs: u64,
    /// Shortest accepted run, minutes
    pub min_minutes: u32,
    /// Longest accepted run, minutes
    pub max_minutes: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let settings = GeneratorSettings::default();
        Self {
            rate_per_minute: settings.rate_per_minute,
            cooldown_secs: settings.cooldown.as_secs(),
            min_minutes: settings.min_minutes,
            max_minutes: settings.max_minutes,
        }
    }
}

impl From<GeneratorConfig> for GeneratorSettings {
    fn from(config: GeneratorConfig) -> Self {
        Self {
            rate_per_minute: config.rate_per_minute,
            cooldown: Duration::from_secs(config.cooldown_secs),
            min_minutes: config.min_minutes,
            max_minutes: config.max_minutes,
        }
    }
}

/// `[inventory]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Stack slots per player
    pub capacity: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

impl AppConfig {
    /// Parses TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let generator = &self.generator;
        if generator.min_minutes == 0 || generator.min_minutes > generator.max_minutes {
            return Err(Error::Config {
                message: format!(
                    "generator min_minutes ({}) must be between 1 and max_minutes ({})",
                    generator.min_minutes, generator.max_minutes
                ),
            });
        }
        if self.gathering.session_secs == 0 || self.gathering.inactivity_secs == 0 {
            return Err(Error::Config {
                message: "gathering durations must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Reads the config at `path`. A missing file yields the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let config = AppConfig::from_toml(&contents)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(AppConfig::default())
        }
        Err(e) => Err(Error::Config {
            message: format!("Failed to read config file {}: {e}", path.display()),
        }),
    }
}

/// Reads the config from `LOOT_BUDDY_CONFIG` or `./config.toml`.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.inventory.capacity, 50);

        let session: SessionSettings = config.gathering.into();
        assert_eq!(session, SessionSettings::default());
        let generator: GeneratorSettings = config.generator.into();
        assert_eq!(generator, GeneratorSettings::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [storage]
            backend = "sqlite"

            [generator]
            rate_per_minute = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.generator.rate_per_minute, 25);
        assert_eq!(config.generator.max_minutes, 480);
        assert_eq!(config.gathering.session_secs, 300);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[storage]\nbackend = \"postgres\""),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            AppConfig::from_toml("[generator]\nmin_minutes = 500"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[inventory]\ncapacity = 80\n").unwrap();
        assert_eq!(load_config(&path).unwrap().inventory.capacity, 80);
    }
}
