//! Config Entries Manager
//!
//! Keeps config entries in memory and drives their setup/unload through the
//! handler registered for each integration domain.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::state_machine::InvalidTransition;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("No integration handler registered for domain {0}")]
    NoHandler(String),

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Integration side of the entry lifecycle
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    /// Set up everything the entry provides
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String>;

    /// Tear the entry down again; `Ok(false)` means the integration refused
    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, String>;
}

/// Config Entries Manager
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Lifecycle handlers by domain
    handlers: DashMap<String, Arc<dyn IntegrationHandler>>,
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            handlers: DashMap::new(),
        }
    }

    /// Register the lifecycle handler of an integration
    pub fn register_handler(&self, domain: impl Into<String>, handler: Arc<dyn IntegrationHandler>) {
        let domain = domain.into();
        debug!("Registered integration handler for {}", domain);
        self.handlers.insert(domain, handler);
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get all entries
    pub fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntry {
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
        self.entries.insert(entry.entry_id.clone(), entry.clone());

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        entry
    }

    /// Remove an entry, unloading it first when loaded
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if matches!(
            entry.state,
            ConfigEntryState::Loaded | ConfigEntryState::SetupError
        ) {
            self.unload(entry_id).await?;
        }

        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(entry_id);
        }
        let (_, removed) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        info!("Removed config entry: {} [{}]", removed.title, entry_id);
        Ok(removed)
    }

    /// Set up an entry and return the state it ended in
    ///
    /// A failing integration leaves the entry in `SetupError` with the
    /// failure as its reason; that is not an error of this call.
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntryState> {
        let entry = self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;
        let handler = match self.handlers.get(&entry.domain) {
            Some(h) => h.value().clone(),
            None => {
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some("integration not found".to_string()),
                )?;
                return Err(ConfigEntriesError::NoHandler(entry.domain));
            }
        };

        let (state, reason) = match handler.setup_entry(&entry).await {
            Ok(()) => {
                info!("Set up {} entry {}", entry.domain, entry.title);
                (ConfigEntryState::Loaded, None)
            }
            Err(e) => {
                warn!("Error setting up entry {} for {}: {}", entry.title, entry.domain, e);
                (ConfigEntryState::SetupError, Some(e))
            }
        };

        self.transition(entry_id, state, reason)?;
        Ok(state)
    }

    /// Unload an entry and return the state it ended in
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntryState> {
        let previous = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?
            .state;
        let entry = self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        // Nothing was set up for an entry that failed setup
        if previous == ConfigEntryState::SetupError {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            return Ok(ConfigEntryState::NotLoaded);
        }

        let outcome = match self.handlers.get(&entry.domain).map(|h| h.value().clone()) {
            Some(handler) => handler.unload_entry(&entry).await,
            None => Err(format!("no handler for {}", entry.domain)),
        };

        let (state, reason) = match outcome {
            Ok(true) => {
                info!("Unloaded {} entry {}", entry.domain, entry.title);
                (ConfigEntryState::NotLoaded, None)
            }
            Ok(false) => (
                ConfigEntryState::FailedUnload,
                Some("integration refused to unload".to_string()),
            ),
            Err(e) => {
                warn!("Error unloading entry {} for {}: {}", entry.title, entry.domain, e);
                (ConfigEntryState::FailedUnload, Some(e))
            }
        };

        self.transition(entry_id, state, reason)?;
        Ok(state)
    }

    /// Unload every loaded entry
    pub async fn unload_all(&self) -> usize {
        let mut count = 0;
        for entry in self.entries() {
            if entry.is_loaded() {
                match self.unload(&entry.entry_id).await {
                    Ok(ConfigEntryState::NotLoaded) => count += 1,
                    Ok(state) => warn!("Entry {} ended in {:?}", entry.title, state),
                    Err(e) => warn!("Failed to unload {}: {}", entry.title, e),
                }
            }
        }
        count
    }

    /// Move an entry to a new state and return a snapshot of it
    fn transition(
        &self,
        entry_id: &str,
        to: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        entry.state = entry.state.try_transition(to)?;
        entry.reason = reason;
        debug!("Entry {} is now {:?}", entry_id, entry.state);
        Ok(entry.clone())
    }
}
