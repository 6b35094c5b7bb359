//! PitchPerfect Configuration
//!
//! Config file: $PITCH_CONFIG, ~/.config/pitchperfect/config.toml or
//! /etc/pitchperfect/config.toml. Missing sections fall back to defaults.

use anyhow::{bail, Context, Result};
use pitch_shared::{GameModeKind, DATA_DIR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where progress records and the score log live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DATA_DIR)
}

/// Write coalescer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Flush window in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Flush early once this many users have pending writes
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Bounded queue between the session and the writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Failed writes are retried this many times, then dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_flush_interval_ms() -> u64 {
    500
}

fn default_max_batch() -> usize {
    32
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_retries() -> u32 {
    3
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            max_batch: default_max_batch(),
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
        }
    }
}

impl PersistenceConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when neither PITCH_LOG nor RUST_LOG is set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_mode")]
    pub default_mode: GameModeKind,
}

fn default_mode() -> GameModeKind {
    GameModeKind::Rpg
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
        }
    }
}

/// Main PitchPerfect configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitchConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl PitchConfig {
    /// Default user config path: ~/.config/pitchperfect/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("Cannot determine home directory")?;
                Path::new(&home).join(".config")
            }
        };

        Ok(config_dir.join("pitchperfect").join("config.toml"))
    }

    /// System config path: /etc/pitchperfect/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/pitchperfect/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. $PITCH_CONFIG (must exist when set)
    /// 2. User config (~/.config/pitchperfect/config.toml)
    /// 3. System config (/etc/pitchperfect/config.toml)
    /// 4. Defaults
    ///
    /// `PITCH_DATA_DIR` overrides the data directory afterwards.
    pub fn load() -> Result<Self> {
        let mut config = match Self::locate()? {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var("PITCH_DATA_DIR") {
            if !dir.is_empty() {
                config.store.data_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn locate() -> Result<Option<PathBuf>> {
        if let Ok(explicit) = std::env::var("PITCH_CONFIG") {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                bail!("PITCH_CONFIG points to missing file {}", path.display());
            }
            return Ok(Some(path));
        }

        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Ok(Some(user_path));
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Ok(Some(system_path));
        }

        Ok(None)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: PitchConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.persistence;
        if p.flush_interval_ms == 0 {
            bail!("persistence.flush_interval_ms must be greater than 0");
        }
        if p.max_batch == 0 {
            bail!("persistence.max_batch must be greater than 0");
        }
        if p.queue_capacity == 0 {
            bail!("persistence.queue_capacity must be greater than 0");
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PitchConfig::default();
        assert_eq!(config.store.data_dir, PathBuf::from(DATA_DIR));
        assert_eq!(config.persistence.flush_interval(), Duration::from_millis(500));
        assert_eq!(config.persistence.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.session.default_mode, GameModeKind::Rpg);
    }

    #[test]
    fn test_partial_file() {
        let config = PitchConfig::from_toml(
            r#"
            [persistence]
            flush_interval_ms = 50

            [session]
            default_mode = "timeAttack"
            "#,
        )
        .unwrap();
        assert_eq!(config.persistence.flush_interval_ms, 50);
        assert_eq!(config.persistence.max_batch, 32);
        assert_eq!(config.session.default_mode, GameModeKind::TimeAttack);
        assert_eq!(config.store.data_dir, PathBuf::from(DATA_DIR));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PitchConfig::from_toml("[persistence]\nmax_batch = 0\n").is_err());
        assert!(PitchConfig::from_toml("[session]\ndefault_mode = \"karaoke\"\n").is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = PitchConfig::default();
        config.store.data_dir = dir.path().join("data");
        config.logging.level = "debug".to_string();
        fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = PitchConfig::from_path(&path).unwrap();
        assert_eq!(loaded.store.data_dir, dir.path().join("data"));
        assert_eq!(loaded.logging.level, "debug");
    }
}
