//! Session configuration
//!
//! Defaults cover a normal install. A JSON file can override any subset:
//!
//! ```json
//! {
//!   "recordName": "FeelGoodGameState",
//!   "fetchTimeout": "5s",
//!   "bonusProbability": 0.25,
//!   "unlockWindow": "1m"
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use feelgood_store::SyncConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::SpawnConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid duration for {field}: {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Everything a `GameSession` needs besides its collaborators
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub sync: SyncConfig,
    pub spawn: SpawnConfig,
    /// Leaderboard receiving the score on every commit
    pub leaderboard_id: String,
    /// How long a newly completed achievement counts as recently unlocked
    pub unlock_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            sync: SyncConfig::default(),
            spawn: SpawnConfig::default(),
            leaderboard_id: "main_leaderboard".to_string(),
            unlock_window: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    record_type: Option<String>,
    record_name: Option<String>,
    fetch_timeout: Option<String>,
    save_timeout: Option<String>,
    bonus_probability: Option<f64>,
    min_size_fraction: Option<f64>,
    max_size_fraction: Option<f64>,
    leaderboard_id: Option<String>,
    unlock_window: Option<String>,
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let mut config = SessionConfig::default();

        if let Some(v) = raw.record_type {
            config.sync.record_type = v;
        }
        if let Some(v) = raw.record_name {
            config.sync.record_name = v;
        }
        if let Some(v) = raw.fetch_timeout {
            config.sync.fetch_timeout = parse_duration("fetchTimeout", &v)?;
        }
        if let Some(v) = raw.save_timeout {
            config.sync.save_timeout = parse_duration("saveTimeout", &v)?;
        }
        if let Some(v) = raw.bonus_probability {
            config.spawn.bonus_probability = unit_fraction("bonusProbability", v)?;
        }
        if let Some(v) = raw.min_size_fraction {
            config.spawn.min_size_fraction = unit_fraction("minSizeFraction", v)?;
        }
        if let Some(v) = raw.max_size_fraction {
            config.spawn.max_size_fraction = unit_fraction("maxSizeFraction", v)?;
        }
        if let Some(v) = raw.leaderboard_id {
            config.leaderboard_id = v;
        }
        if let Some(v) = raw.unlock_window {
            config.unlock_window = parse_duration("unlockWindow", &v)?;
        }

        if config.spawn.min_size_fraction > config.spawn.max_size_fraction {
            return Err(ConfigError::Invalid {
                field: "minSizeFraction",
                reason: "exceeds maxSizeFraction".to_string(),
            });
        }
        if config.sync.fetch_timeout.is_zero() || config.sync.save_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "fetchTimeout",
                reason: "remote deadlines must be positive".to_string(),
            });
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|source| ConfigError::Duration { field, source })
}

fn unit_fraction(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} is outside [0, 1]", value),
        })
    }
}
