//! Logger configuration
//!
//! Parses the `logger:` section and turns it into a tracing filter directive:
//!
//! ```yaml
//! logger:
//!   default: warning
//!   logs:
//!     wb_components: debug
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Log severity as written in configuration.yaml
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[serde(alias = "fatal")]
    Critical,
    Error,
    #[serde(alias = "warn")]
    Warning,
    #[default]
    Info,
    Debug,
    Notset,
}

impl LogLevel {
    /// Equivalent tracing level name
    pub fn as_directive(self) -> &'static str {
        match self {
            // tracing has nothing above error
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Notset => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" | "fatal" => Ok(LogLevel::Critical),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "notset" => Ok(LogLevel::Notset),
            other => Err(ConfigError::InvalidValue {
                key: "logger".to_string(),
                reason: format!("unknown log level '{}'", other),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Notset => "notset",
        };
        f.write_str(name)
    }
}

/// The `logger:` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoggerConfig {
    #[serde(default)]
    pub default: LogLevel,

    /// Per-target overrides, keyed by module path
    #[serde(default)]
    pub logs: BTreeMap<String, LogLevel>,
}

impl LoggerConfig {
    pub fn from_section(section: Option<&Value>) -> ConfigResult<Self> {
        match section {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(section) => {
                serde_yaml::from_value(section.clone()).map_err(|e| ConfigError::InvalidValue {
                    key: "logger".to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Filter directive in `EnvFilter` syntax, e.g. `info,wb_components=debug`
    pub fn directives(&self) -> String {
        let mut out = self.default.as_directive().to_string();
        for (target, level) in &self.logs {
            // python-style dotted paths map onto rust module paths
            let target = target.replace('.', "::");
            out.push_str(&format!(",{}={}", target, level.as_directive()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_info() {
        let config = LoggerConfig::from_section(None).unwrap();
        assert_eq!(config.default, LogLevel::Info);
        assert_eq!(config.directives(), "info");
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("fatal".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }

    #[test]
    fn test_directives() {
        let section: Value = serde_yaml::from_str(
            r#"
default: warning
logs:
  wb_components: debug
  wb_config_entries.manager: notset
"#,
        )
        .unwrap();

        let config = LoggerConfig::from_section(Some(&section)).unwrap();
        assert_eq!(
            config.directives(),
            "warn,wb_components=debug,wb_config_entries::manager=trace"
        );
    }

    #[test]
    fn test_invalid_level() {
        let section: Value = serde_yaml::from_str("default: loud\n").unwrap();
        assert!(matches!(
            LoggerConfig::from_section(Some(&section)),
            Err(ConfigError::InvalidValue { key, .. }) if key == "logger"
        ));
    }
}
