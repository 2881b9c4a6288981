//! Configuration
//!
//! A single TOML file with a default for every value. Each network may
//! override any `[game]` setting.
//!
//! ```toml
//! bot_nick = "DuckHunt"
//!
//! [storage]
//! backend = "snapshot"
//! path = "duckhunt.data"
//!
//! [game]
//! min_spawn = 600
//! max_spawn = 1800
//!
//! [networks.libera]
//! channels = ["#ducks"]
//! owners = ["alice"]
//! max_ducks = 3
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::game::schedule::SpawnWindow;
use crate::game::shop::ShopPrices;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DUCKHUNT_CONFIG";

/// Config file used when neither an argument nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "duckhunt.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Storage backend choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON document on disk.
    Snapshot,
    /// Per-field tables with an append-only journal on disk.
    Table,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend implementation.
    pub backend: StorageBackend,
    /// Snapshot document or table journal, depending on the backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Snapshot,
            path: PathBuf::from("duckhunt.data"),
        }
    }
}

/// `[game]` section: rules that may differ per network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Shortest natural gap between spawns, seconds.
    pub min_spawn: u64,
    /// Longest natural gap between spawns, seconds.
    pub max_spawn: u64,
    /// Probability that a spawn is golden.
    pub gold_ratio: f64,
    /// Live ducks allowed per channel.
    pub max_ducks: usize,
    /// Seconds before a duck flies away.
    pub despawn_time: u64,
    /// XP for a regular duck.
    pub default_xp: i64,
    /// XP for a golden duck.
    pub golden_xp: i64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_spawn: 600,
            max_spawn: 1800,
            gold_ratio: 0.1,
            max_ducks: 5,
            despawn_time: 720,
            default_xp: 10,
            golden_xp: 50,
        }
    }
}

impl GameSettings {
    /// Natural spawn window.
    pub fn spawn_window(&self) -> SpawnWindow {
        SpawnWindow::new(self.min_spawn as f64, self.max_spawn as f64)
    }

    fn validate(&self, scope: &str) -> Result<(), ConfigError> {
        if self.min_spawn > self.max_spawn {
            return Err(ConfigError::Invalid(format!(
                "{}: min_spawn ({}) exceeds max_spawn ({})",
                scope, self.min_spawn, self.max_spawn
            )));
        }
        if !(0.0..=1.0).contains(&self.gold_ratio) {
            return Err(ConfigError::Invalid(format!(
                "{}: gold_ratio must be within [0, 1], got {}",
                scope, self.gold_ratio
            )));
        }
        if self.max_ducks == 0 {
            return Err(ConfigError::Invalid(format!("{}: max_ducks must be at least 1", scope)));
        }
        if self.despawn_time == 0 {
            return Err(ConfigError::Invalid(format!("{}: despawn_time must be positive", scope)));
        }
        Ok(())
    }
}

/// Per-network values that replace `[game]` settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GameOverrides {
    pub min_spawn: Option<u64>,
    pub max_spawn: Option<u64>,
    pub gold_ratio: Option<f64>,
    pub max_ducks: Option<usize>,
    pub despawn_time: Option<u64>,
    pub default_xp: Option<i64>,
    pub golden_xp: Option<i64>,
}

/// `[networks.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Channels joined after registration.
    pub channels: Vec<String>,
    /// Nicks with full control.
    pub owners: Vec<String>,
    /// Nicks allowed to run admin commands.
    pub admins: Vec<String>,
    /// Rule overrides.
    #[serde(flatten)]
    pub overrides: GameOverrides,
}

impl NetworkConfig {
    /// Effective rules for this network.
    pub fn settings(&self, base: &GameSettings) -> GameSettings {
        let o = &self.overrides;
        GameSettings {
            min_spawn: o.min_spawn.unwrap_or(base.min_spawn),
            max_spawn: o.max_spawn.unwrap_or(base.max_spawn),
            gold_ratio: o.gold_ratio.unwrap_or(base.gold_ratio),
            max_ducks: o.max_ducks.unwrap_or(base.max_ducks),
            despawn_time: o.despawn_time.unwrap_or(base.despawn_time),
            default_xp: o.default_xp.unwrap_or(base.default_xp),
            golden_xp: o.golden_xp.unwrap_or(base.golden_xp),
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

/// Whole configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// The bot's nick; never chosen as an accident victim.
    pub bot_nick: String,
    /// Engine tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Only players marked authenticated by the network may play.
    pub require_auth: bool,
    /// Storage.
    pub storage: StorageConfig,
    /// Default rules.
    pub game: GameSettings,
    /// Shop prices.
    pub shop: ShopPrices,
    /// Networks by name.
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bot_nick: "DuckHunt".to_string(),
            tick_interval_ms: 1000,
            require_auth: false,
            storage: StorageConfig::default(),
            game: GameSettings::default(),
            shop: ShopPrices::default(),
            networks: BTreeMap::new(),
        }
    }
}

impl GameConfig {
    /// Path from the first CLI argument, else the environment, else the default.
    pub fn resolve_path(arg: Option<String>) -> PathBuf {
        arg.or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate a config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml(&raw)?
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without validating.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Check every value range, including each network's effective rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 || self.tick_interval_ms > 1000 {
            return Err(ConfigError::Invalid(format!(
                "tick_interval_ms must be within 1..=1000, got {}",
                self.tick_interval_ms
            )));
        }
        self.game.validate("game")?;
        for (name, network) in &self.networks {
            network.settings(&self.game).validate(&format!("networks.{}", name))?;
        }
        Ok(())
    }

    /// Effective rules for a network (defaults for unknown networks).
    pub fn settings_for(&self, network: &str) -> GameSettings {
        self.networks
            .get(network)
            .map_or_else(|| self.game.clone(), |n| n.settings(&self.game))
    }
}
