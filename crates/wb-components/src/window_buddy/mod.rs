//! Window Buddy Component
//!
//! Estimates how much direct sun a window receives. Each config entry
//! describes one window and gets one `sensor.<name>` entity whose state is
//! the exposure in percent, recomputed from the sun entity on every update.
//!
//! Entries come from the config flow in [`config_flow`] or from
//! `window_buddy:` in configuration.yaml, which is replayed through the same
//! flow so both paths validate identically.

pub mod config_flow;
pub mod sensor;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use wb_config_entries::{
    ConfigEntries, ConfigEntry, ConfigEntrySource, ConfigFlow, EntryData, FlowManager, FlowStep,
    IntegrationHandler,
};
use wb_core::EntityIdError;
use wb_exposure::{Blockade, BlockadeSide, Blockades, CalculationMode, WindowConfig, WindowConfigError};
use wb_state_machine::StateMachine;

pub use config_flow::{
    AzimuthStepInput, PreciseExtraStepInput, UserStepInput, WindowBuddyFlow, STEP_AZIMUTH,
    STEP_PRECISE_EXTRA, STEP_USER,
};
pub use sensor::WindowBuddySensor;

pub const DOMAIN: &str = "window_buddy";

/// Sun entity used when the user does not pick one
pub const DEFAULT_SUN_ENTITY: &str = "sun.sun";

/// How often the host refreshes every window sensor
pub const SCAN_INTERVAL: Duration = Duration::from_secs(30);

pub const CONF_NAME: &str = "name";
pub const CONF_CALCULATION_MODE: &str = "calculation_mode";
pub const CONF_ENTITY_ID: &str = "entity_id";
pub const CONF_AZIMUTH: &str = "azimuth";
pub const CONF_WIDTH: &str = "width";
pub const CONF_HEIGHT: &str = "height";

pub const BLOCK_LEFT_SIDE: &str = "block_left_side";
pub const BLOCK_LEFT_AWAY: &str = "block_left_away";
pub const BLOCK_LEFT_ANGLE: &str = "block_left_angle";
pub const BLOCK_RIGHT_SIDE: &str = "block_right_side";
pub const BLOCK_RIGHT_AWAY: &str = "block_right_away";
pub const BLOCK_RIGHT_ANGLE: &str = "block_right_angle";
pub const BLOCK_TOP_SIDE: &str = "block_top_side";
pub const BLOCK_TOP_AWAY: &str = "block_top_away";
pub const BLOCK_TOP_ANGLE: &str = "block_top_angle";
pub const BLOCK_BOTTOM_SIDE: &str = "block_bottom_side";
pub const BLOCK_BOTTOM_AWAY: &str = "block_bottom_away";
pub const BLOCK_BOTTOM_ANGLE: &str = "block_bottom_angle";

/// Errors raised while setting up a window entry
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid entry data: {0}")]
    InvalidData(#[from] serde_json::Error),

    #[error("invalid window: {0}")]
    InvalidWindow(#[from] WindowConfigError),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(#[from] EntityIdError),
}

fn default_sun_entity() -> String {
    DEFAULT_SUN_ENTITY.to_string()
}

/// The twelve optional blockade fields of the precise step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockadeFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_left_side: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_left_away: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_left_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_right_side: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_right_away: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_right_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_top_side: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_top_away: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_top_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_bottom_side: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_bottom_away: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_bottom_angle: Option<f64>,
}

impl BlockadeFields {
    pub fn to_blockades(&self) -> Blockades {
        let mut blockades = Blockades::default();
        let sides = [
            (BlockadeSide::Left, self.block_left_side, self.block_left_away, self.block_left_angle),
            (BlockadeSide::Right, self.block_right_side, self.block_right_away, self.block_right_angle),
            (BlockadeSide::Top, self.block_top_side, self.block_top_away, self.block_top_angle),
            (
                BlockadeSide::Bottom,
                self.block_bottom_side,
                self.block_bottom_away,
                self.block_bottom_angle,
            ),
        ];
        for (side, side_distance, away_distance, angle) in sides {
            blockades.set(
                side,
                Blockade {
                    side_distance,
                    away_distance,
                    angle,
                },
            );
        }
        blockades
    }
}

/// Data stored in a window_buddy config entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEntryData {
    pub name: String,
    #[serde(default)]
    pub calculation_mode: CalculationMode,
    /// Entity the sun position is read from
    #[serde(default = "default_sun_entity")]
    pub entity_id: String,
    pub azimuth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(flatten)]
    pub blockades: BlockadeFields,
}

impl WindowEntryData {
    pub fn from_entry_data(data: &EntryData) -> Result<Self, SetupError> {
        let object = data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }

    pub fn to_entry_data(&self) -> EntryData {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => EntryData::new(),
        }
    }

    /// Validated window configuration for the calculator
    pub fn window_config(&self) -> Result<WindowConfig, WindowConfigError> {
        match self.calculation_mode {
            CalculationMode::Simple => WindowConfig::simple(self.azimuth),
            CalculationMode::Precise => WindowConfig::precise(
                self.azimuth,
                self.width.ok_or(WindowConfigError::MissingDimension(CONF_WIDTH))?,
                self.height.ok_or(WindowConfigError::MissingDimension(CONF_HEIGHT))?,
                self.blockades.to_blockades(),
            ),
        }
    }
}

/// The window_buddy integration: one sensor per loaded entry
pub struct WindowBuddy {
    states: Arc<StateMachine>,
    /// entry_id -> sensor
    sensors: DashMap<String, WindowBuddySensor>,
}

impl WindowBuddy {
    pub fn new(states: Arc<StateMachine>) -> Self {
        Self {
            states,
            sensors: DashMap::new(),
        }
    }

    pub fn sensor(&self, entry_id: &str) -> Option<WindowBuddySensor> {
        self.sensors.get(entry_id).map(|s| s.value().clone())
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Create the entry's sensor and publish its first value
    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id))]
    pub fn setup(&self, entry: &ConfigEntry) -> Result<(), SetupError> {
        let data = WindowEntryData::from_entry_data(&entry.data)?;
        let window = data.window_config()?;
        let entity_id = self.states.generate_entity_id(wb_core::domains::SENSOR, &data.name)?;

        let sensor = WindowBuddySensor::new(&entry.entry_id, entity_id, data, window);
        let state = sensor.update(&self.states);
        info!("Set up {} = {}%", sensor.entity_id(), state.state);

        self.sensors.insert(entry.entry_id.clone(), sensor);
        Ok(())
    }

    /// Drop the entry's sensor and its published state
    pub fn unload(&self, entry_id: &str) -> bool {
        match self.sensors.remove(entry_id) {
            Some((_, sensor)) => {
                self.states.remove(sensor.entity_id());
                debug!("Removed {}", sensor.entity_id());
                true
            }
            None => false,
        }
    }

    /// Recompute every sensor from the current sun state
    pub fn update_all(&self) -> usize {
        for sensor in self.sensors.iter() {
            sensor.update(&self.states);
        }
        self.sensors.len()
    }
}

#[async_trait]
impl IntegrationHandler for WindowBuddy {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        self.setup(entry).map_err(|e| e.to_string())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, String> {
        if !self.unload(&entry.entry_id) {
            debug!("No sensor loaded for entry {}", entry.entry_id);
        }
        Ok(true)
    }
}

/// Register the integration and its config flow with the host
pub fn register(
    entries: &ConfigEntries,
    flows: &FlowManager,
    states: Arc<StateMachine>,
) -> Arc<WindowBuddy> {
    let integration = Arc::new(WindowBuddy::new(states));
    entries.register_handler(DOMAIN, integration.clone());
    flows.register(
        DOMAIN,
        Arc::new(|| Box::new(WindowBuddyFlow::new()) as Box<dyn ConfigFlow>),
    );
    info!("Window Buddy registered");
    integration
}

/// Replay the `window_buddy:` YAML section through the config flow
///
/// Returns the ids of the created entries. Invalid windows are logged and
/// skipped.
pub async fn import_from_yaml(flows: &FlowManager, section: &serde_yaml::Value) -> Vec<String> {
    let Some(windows) = section.as_sequence() else {
        warn!("{}: expected a list of windows", DOMAIN);
        return Vec::new();
    };

    let mut created = Vec::new();
    for (index, window) in windows.iter().enumerate() {
        let input = match serde_json::to_value(window) {
            Ok(input) => input,
            Err(e) => {
                warn!("{}[{}]: cannot convert window config: {}", DOMAIN, index, e);
                continue;
            }
        };

        match import_window(flows, input).await {
            Ok(entry_id) => created.push(entry_id),
            Err(reason) => warn!("{}[{}]: skipping invalid window: {}", DOMAIN, index, reason),
        }
    }

    if !created.is_empty() {
        info!("Imported {} {} entries", created.len(), DOMAIN);
    }
    created
}

/// Submit the whole window config to each step until an entry is created
async fn import_window(flows: &FlowManager, input: serde_json::Value) -> Result<String, String> {
    let mut result = flows
        .start_flow(DOMAIN, ConfigEntrySource::Import)
        .await
        .map_err(|e| e.to_string())?;

    // user, azimuth, precise_extra
    for _ in 0..3 {
        match &result.step {
            FlowStep::Form(form) if !form.errors.is_empty() => break,
            FlowStep::Form(_) => {}
            FlowStep::CreateEntry { .. } => break,
            FlowStep::Abort { reason } => return Err(reason.clone()),
        }
        let flow_id = result.flow_id.clone();
        result = flows
            .progress_flow(&flow_id, Some(input.clone()))
            .await
            .map_err(|e| e.to_string())?;
    }

    if let (FlowStep::CreateEntry { .. }, Some(entry_id)) = (&result.step, &result.entry_id) {
        return Ok(entry_id.clone());
    }

    let reason = match &result.step {
        FlowStep::Form(form) if !form.errors.is_empty() => {
            let mut errors: Vec<_> = form
                .errors
                .iter()
                .map(|(field, error)| format!("{field}: {error}"))
                .collect();
            errors.sort();
            format!("step {}: {}", form.step_id, errors.join(", "))
        }
        _ => "config flow did not finish".to_string(),
    };
    // The flow may already be gone
    let _ = flows.abort_flow(&result.flow_id).await;
    Err(reason)
}
