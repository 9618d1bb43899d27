use crate::error::ConfigError;
use crate::transport::{DEFAULT_MAX_ATTEMPTS, normalize_endpoint};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Log level for the CLI subscriber (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub injection: InjectionConfig,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            log_level: default_log_level(),
            connection: ConnectionConfig::default(),
            tracking: TrackingConfig::default(),
            injection: InjectionConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "connection.max_attempts must be at least 1".into(),
            ));
        }
        normalize_endpoint(&self.connection.endpoint).map_err(|e| {
            ConfigError::Validation(format!("connection.endpoint: {e}"))
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server endpoint; http(s) is rewritten to ws(s) (default: http://localhost:8765)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Connect attempts before an explicit reset is required (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before an automatic reconnect (default: 5000)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8765".into()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled_on_start: bool,
    #[serde(default = "default_click_throttle_ms")]
    pub click_throttle_ms: u64,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_click_throttle_ms() -> u64 {
    300
}

fn default_max_text_chars() -> usize {
    100
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled_on_start: true,
            click_throttle_ms: default_click_throttle_ms(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

impl TrackingConfig {
    pub fn click_throttle(&self) -> Duration {
        Duration::from_millis(self.click_throttle_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Apply unpublished instructions for preview
    #[serde(default)]
    pub dyna_dubbing: bool,
    /// Apply every instruction regardless of publish state
    #[serde(default)]
    pub force_apply_all: bool,
}
