//! Window Buddy Server
//!
//! Loads configuration.yaml, publishes the sun entity, imports the configured
//! windows and keeps their exposure sensors up to date until Ctrl-C.
//!
//! Usage: `window-buddy [CONFIG_DIR]` (defaults to `config`)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wb_components::sun::Sun;
use wb_components::window_buddy::{self, WindowBuddy, DOMAIN, SCAN_INTERVAL};
use wb_config::{Configuration, Value, CONFIG_FILE};
use wb_config_entries::{ConfigEntries, ConfigEntryState, FlowManager};
use wb_state_machine::StateMachine;

const DEFAULT_CONFIG_DIR: &str = "config";

/// The running Window Buddy instance
pub struct WindowBuddyHost {
    /// State machine for entity states
    pub states: Arc<StateMachine>,
    /// Config entries and their lifecycle
    pub entries: Arc<ConfigEntries>,
    /// Config flows in progress
    pub flows: FlowManager,
    sun: Sun,
    windows: Arc<WindowBuddy>,
}

impl WindowBuddyHost {
    pub fn new(config: &Configuration) -> Result<Self> {
        let states = Arc::new(StateMachine::new());
        let entries = Arc::new(ConfigEntries::new());
        let flows = FlowManager::new(entries.clone());

        let sun = Sun::new(config.core.latitude, config.core.longitude)?;
        let windows = window_buddy::register(&entries, &flows, states.clone());

        Ok(Self {
            states,
            entries,
            flows,
            sun,
            windows,
        })
    }

    /// Create entries for the windows in configuration.yaml
    pub async fn import_windows(&self, config: &Configuration) -> usize {
        match config.integration(DOMAIN) {
            Some(section) => window_buddy::import_from_yaml(&self.flows, section)
                .await
                .len(),
            None => {
                debug!("No {} section in configuration", DOMAIN);
                0
            }
        }
    }

    /// Set up every entry that is not loaded yet; returns how many loaded
    pub async fn setup_entries(&self) -> usize {
        let mut loaded = 0;
        for entry in self.entries.entries() {
            if entry.state != ConfigEntryState::NotLoaded {
                continue;
            }
            match self.entries.setup(&entry.entry_id).await {
                Ok(ConfigEntryState::Loaded) => loaded += 1,
                Ok(state) => warn!("Entry {} ended in {:?}", entry.title, state),
                Err(e) => warn!("Failed to set up {}: {}", entry.title, e),
            }
        }
        loaded
    }

    /// Publish the sun position, then recompute every window sensor
    pub fn refresh(&self, now: DateTime<Utc>) {
        self.sun.update(&self.states, now);
        let count = self.windows.update_all();
        debug!("Refreshed {} window sensors", count);
    }

    pub async fn shutdown(&self) {
        let unloaded = self.entries.unload_all().await;
        info!("Unloaded {} entries", unloaded);
    }
}

fn load_configuration(config_dir: &Path) -> Result<Configuration> {
    if !config_dir.join(CONFIG_FILE).exists() {
        // No logging yet, the logger section is part of the file
        eprintln!(
            "{} not found in {}, using defaults",
            CONFIG_FILE,
            config_dir.display()
        );
        return Ok(Configuration::from_yaml(Value::Null)?);
    }
    Configuration::load(config_dir)
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))
}

fn init_tracing(config: &Configuration) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logger.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));

    let config = load_configuration(&config_dir)?;
    init_tracing(&config);

    info!(
        "Starting Window Buddy for {} ({}, {})",
        config.core.name, config.core.latitude, config.core.longitude
    );

    let host = WindowBuddyHost::new(&config)?;
    host.refresh(Utc::now());

    let imported = host.import_windows(&config).await;
    let loaded = host.setup_entries().await;
    info!("Imported {} windows, {} loaded", imported, loaded);

    let mut interval = tokio::time::interval(SCAN_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => host.refresh(Utc::now()),
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    info!("Shutting down...");
    host.shutdown().await;

    Ok(())
}
