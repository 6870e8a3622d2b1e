//! Runtime configuration.

use crate::mission::MissionVariant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reconnection settings for the remote signal transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Delay between reconnection attempts in milliseconds
    pub reconnect_interval_ms: u64,

    /// Attempts before giving up; reset after every successful connection
    pub max_reconnect_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 3000,
            max_reconnect_attempts: 5,
        }
    }
}

/// Settings for one sentinel process.
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```rust
/// use pasture_sentinel::config::SentinelConfig;
/// use pasture_sentinel::mission::MissionVariant;
///
/// let config = SentinelConfig::from_json(r#"{ "variant": "timed_escalation" }"#).unwrap();
/// assert_eq!(config.variant, MissionVariant::TimedEscalation);
/// assert_eq!(config.escalation_ms, 2000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Which mission definition to run
    pub variant: MissionVariant,

    /// Delay before automatic escalation in the timed variant
    pub escalation_ms: u64,

    /// Macrosteps kept in the history; `null` keeps everything
    pub history_limit: Option<usize>,

    pub transport: TransportConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            variant: MissionVariant::default(),
            escalation_ms: 2000,
            history_limit: Some(256),
            transport: TransportConfig::default(),
        }
    }
}

impl SentinelConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn escalation(&self) -> Duration {
        Duration::from_millis(self.escalation_ms)
    }
}
