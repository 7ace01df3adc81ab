//! YAML configuration loading for Window Buddy
//!
//! Reads `configuration.yaml` from a config directory with support for:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! The loaded document is split into the `homeassistant:` core section, the
//! `logger:` section, and per-integration sections read by each component.
//!
//! # Example
//!
//! ```ignore
//! use wb_config::Configuration;
//!
//! let config = Configuration::load("/config")?;
//! println!("{} at {}, {}", config.core.name, config.core.latitude, config.core.longitude);
//! let windows = config.integration("window_buddy");
//! ```

mod core_config;
mod error;
mod loader;
mod logger;
mod secrets;

use std::path::Path;

pub use core_config::CoreConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use logger::{LogLevel, LoggerConfig};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;

/// Name of the main configuration file inside the config directory
pub const CONFIG_FILE: &str = "configuration.yaml";

/// A fully loaded configuration.yaml
#[derive(Debug, Clone)]
pub struct Configuration {
    pub core: CoreConfig,
    pub logger: LoggerConfig,
    /// The whole document after tag processing
    raw: Value,
}

impl Configuration {
    /// Load `configuration.yaml` from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = load_yaml(config_dir.as_ref(), CONFIG_FILE)?;
        Self::from_yaml(raw)
    }

    /// Build from an already loaded YAML document
    pub fn from_yaml(raw: Value) -> ConfigResult<Self> {
        if !raw.is_mapping() && !raw.is_null() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        Ok(Self {
            core: CoreConfig::from_section(raw.get("homeassistant"))?,
            logger: LoggerConfig::from_section(raw.get("logger"))?,
            raw,
        })
    }

    /// The raw section configured for an integration domain
    pub fn integration(&self, domain: &str) -> Option<&Value> {
        self.raw.get(domain).filter(|v| !v.is_null())
    }
}
