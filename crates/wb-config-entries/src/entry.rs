//! Config Entry types
//!
//! A ConfigEntry represents a single instance of an integration's configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable configuration data of an entry
pub type EntryData = HashMap<String, serde_json::Value>;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Currently being set up
    SetupInProgress,
    /// Successfully set up
    Loaded,
    /// Setup failed (recoverable)
    SetupError,
    /// Currently unloading
    UnloadInProgress,
    /// Unload failed (not recoverable)
    FailedUnload,
}

/// Source of the config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Created through the config flow
    #[default]
    User,
    /// Imported from configuration.yaml
    Import,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g. "window_buddy")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    #[serde(default)]
    pub data: EntryData,

    /// Schema version of `data`
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for failed states
    #[serde(skip, default)]
    pub reason: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: EntryData::new(),
            version: default_version(),
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: EntryData) -> Self {
        self.data = data;
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry() {
        let entry = ConfigEntry::new("window_buddy", "Office");
        assert_eq!(entry.domain, "window_buddy");
        assert_eq!(entry.title, "Office");
        assert_eq!(entry.entry_id.len(), 26);
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert_eq!(entry.source, ConfigEntrySource::User);
        assert!(!entry.is_loaded());
    }

    #[test]
    fn test_serialize_skips_runtime_state() {
        let mut entry = ConfigEntry::new("window_buddy", "Office")
            .with_data(EntryData::from([("azimuth".to_string(), json!(90))]))
            .with_source(ConfigEntrySource::Import);
        entry.state = ConfigEntryState::Loaded;

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["source"], "import");
        assert_eq!(value["data"]["azimuth"], 90);
        assert!(value.get("state").is_none());

        let parsed: ConfigEntry = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.state, ConfigEntryState::NotLoaded);
        assert_eq!(parsed.entry_id, entry.entry_id);
    }
}
