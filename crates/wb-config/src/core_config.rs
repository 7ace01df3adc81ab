//! Core location configuration
//!
//! Parses the `homeassistant:` section from configuration.yaml

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{ConfigError, ConfigResult};

/// Location configuration from the `homeassistant:` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Name of the location (e.g., "Home")
    #[serde(default = "default_name")]
    pub name: String,

    /// Latitude in degrees, north positive
    #[serde(default)]
    pub latitude: f64,

    /// Longitude in degrees, east positive
    #[serde(default)]
    pub longitude: f64,
}

fn default_name() -> String {
    "Home".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl CoreConfig {
    /// Parse the `homeassistant:` section; a missing or empty section yields defaults
    pub fn from_section(section: Option<&Value>) -> ConfigResult<Self> {
        let section = match section {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(section) => section.clone(),
        };

        let config: CoreConfig =
            serde_yaml::from_value(section).map_err(|e| ConfigError::InvalidValue {
                key: "homeassistant".to_string(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::InvalidValue {
                key: "homeassistant.latitude".to_string(),
                reason: format!("{} is outside -90..=90", self.latitude),
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::InvalidValue {
                key: "homeassistant.longitude".to_string(),
                reason: format!("{} is outside -180..=180", self.longitude),
            });
        }
        Ok(())
    }
}
