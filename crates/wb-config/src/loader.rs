//! YAML configuration loader with custom tag support

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader resolving `!include`, `!secret` and `!env_var`
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a loader for the given config directory, reading its secrets
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let v = self.process_value(v, source_path)?;
                    result.insert(k, v);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!include" => {
                let path = self.include_path(&tagged.value, source_path)?;
                debug!("Including file: {:?}", path);
                self.load_file(&path)
            }
            "!secret" => {
                let key = tag_argument("!secret", &tagged.value)?;
                debug!("Substituted secret: {}", key);
                self.secrets.get(key).cloned()
            }
            "!env_var" => {
                let var = tag_argument("!env_var", &tagged.value)?;
                let value = std::env::var(var).map_err(|_| ConfigError::EnvVarNotFound {
                    var: var.to_string(),
                })?;
                debug!("Substituted env var: {}", var);
                Ok(Value::String(value))
            }
            _ => {
                // Unknown tag, keep it but process the inner value
                let value = self.process_value(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    /// Resolve an include target relative to the including file
    fn include_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path = value.as_str().ok_or_else(|| ConfigError::InvalidIncludePath {
            path: format!("{:?}", value),
            reason: "path must be a string".to_string(),
        })?;

        let base_dir = source_path.parent().unwrap_or(self.config_dir.as_path());
        Ok(if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            base_dir.join(path)
        })
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

fn tag_argument<'a>(tag: &str, value: &'a Value) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "argument must be a string".to_string(),
    })
}

/// Load a YAML file from a config directory, resolving all custom tags
pub fn load_yaml(config_dir: impl AsRef<Path>, filename: &str) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir.as_ref())?;
    loader.load_file(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_plain_yaml() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "configuration.yaml", "homeassistant:\n  name: Home\n");

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(value["homeassistant"]["name"].as_str(), Some("Home"));
    }

    #[test]
    fn test_include() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "configuration.yaml",
            "window_buddy: !include windows.yaml\n",
        );
        write(
            dir.path(),
            "windows.yaml",
            "- name: Office\n  azimuth: 135\n",
        );

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(value["window_buddy"][0]["azimuth"].as_f64(), Some(135.0));
    }

    #[test]
    fn test_circular_include() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let err = load_yaml(dir.path(), "a.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::CircularInclude { .. }));
    }

    #[test]
    fn test_secret() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "secrets.yaml", "home_latitude: 59.33\n");
        write(
            dir.path(),
            "configuration.yaml",
            "homeassistant:\n  latitude: !secret home_latitude\n",
        );

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(value["homeassistant"]["latitude"].as_f64(), Some(59.33));
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "configuration.yaml",
            "homeassistant:\n  latitude: !secret nope\n",
        );

        let err = load_yaml(dir.path(), "configuration.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::SecretNotFound { key } if key == "nope"));
    }

    #[test]
    fn test_env_var() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("WB_TEST_HOME_NAME", "Lighthouse");
        write(
            dir.path(),
            "configuration.yaml",
            "homeassistant:\n  name: !env_var WB_TEST_HOME_NAME\n",
        );

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(value["homeassistant"]["name"].as_str(), Some("Lighthouse"));

        write(
            dir.path(),
            "configuration.yaml",
            "homeassistant:\n  name: !env_var WB_TEST_UNSET_VARIABLE\n",
        );
        assert!(matches!(
            load_yaml(dir.path(), "configuration.yaml"),
            Err(ConfigError::EnvVarNotFound { .. })
        ));
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "configuration.yaml", "key: [unclosed\n");
        assert!(matches!(
            load_yaml(dir.path(), "configuration.yaml"),
            Err(ConfigError::ParseYaml { .. })
        ));
    }
}
