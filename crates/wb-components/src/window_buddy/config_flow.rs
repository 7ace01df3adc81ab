//! Window Buddy config flow
//!
//! ```text
//! user -> azimuth -> create_entry            (simple)
//! user -> azimuth -> precise_extra -> create_entry  (precise)
//! ```
//!
//! Every step decodes its input into a typed struct. The flow state carries
//! the inputs accepted so far, so the entry is built from validated values
//! only.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use wb_config_entries::{ConfigFlow, FlowError, FlowStep, FormField, NumberSelectorMode, Selector};
use wb_core::{domains, EntityId};
use wb_exposure::{CalculationMode, WindowConfig};

use super::{
    default_sun_entity, BlockadeFields, WindowEntryData, BLOCK_BOTTOM_ANGLE, BLOCK_BOTTOM_AWAY,
    BLOCK_BOTTOM_SIDE, BLOCK_LEFT_ANGLE, BLOCK_LEFT_AWAY, BLOCK_LEFT_SIDE, BLOCK_RIGHT_ANGLE,
    BLOCK_RIGHT_AWAY, BLOCK_RIGHT_SIDE, BLOCK_TOP_ANGLE, BLOCK_TOP_AWAY, BLOCK_TOP_SIDE,
    CONF_AZIMUTH, CONF_CALCULATION_MODE, CONF_ENTITY_ID, CONF_HEIGHT, CONF_NAME, CONF_WIDTH,
    DEFAULT_SUN_ENTITY,
};

pub const STEP_USER: &str = "user";
pub const STEP_AZIMUTH: &str = "azimuth";
pub const STEP_PRECISE_EXTRA: &str = "precise_extra";
/// Reported once the entry has been created
pub const STEP_DONE: &str = "done";

const ERROR_REQUIRED: &str = "required";
const ERROR_INVALID_ENTITY: &str = "invalid_entity";
const ERROR_INVALID_AZIMUTH: &str = "invalid_azimuth";
const ERROR_INVALID_DIMENSION: &str = "invalid_dimension";
const ERROR_INVALID_INPUT: &str = "invalid_input";
const ERROR_BASE: &str = "base";

type FormErrors = HashMap<String, String>;

/// Input of the `user` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStepInput {
    pub name: String,
    #[serde(default)]
    pub calculation_mode: CalculationMode,
    #[serde(default = "default_sun_entity")]
    pub entity_id: String,
}

/// Input of the `azimuth` step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AzimuthStepInput {
    pub azimuth: f64,
}

/// Input of the `precise_extra` step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreciseExtraStepInput {
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub blockades: BlockadeFields,
}

/// Where the flow is and what it has collected
#[derive(Debug, Clone)]
enum FlowState {
    User,
    Azimuth {
        user: UserStepInput,
    },
    PreciseExtra {
        user: UserStepInput,
        azimuth: AzimuthStepInput,
    },
    Finished,
}

impl FlowState {
    fn step_id(&self) -> &'static str {
        match self {
            FlowState::User => STEP_USER,
            FlowState::Azimuth { .. } => STEP_AZIMUTH,
            FlowState::PreciseExtra { .. } => STEP_PRECISE_EXTRA,
            FlowState::Finished => STEP_DONE,
        }
    }
}

/// Config flow creating one window entry
#[derive(Debug, Clone)]
pub struct WindowBuddyFlow {
    state: FlowState,
}

impl Default for WindowBuddyFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBuddyFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::User,
        }
    }

    /// Step whose input the flow expects next
    pub fn current_step(&self) -> &'static str {
        self.state.step_id()
    }

    fn current_form(&self) -> FlowStep {
        match &self.state {
            FlowState::User | FlowState::Finished => user_form(),
            FlowState::Azimuth { user } => azimuth_form(user.calculation_mode),
            FlowState::PreciseExtra { .. } => precise_extra_form(),
        }
    }

    fn step_user(&mut self, input: Value) -> FlowStep {
        match parse_user(input) {
            Ok(user) => {
                debug!("Window {} uses {} mode", user.name, user.calculation_mode);
                let form = azimuth_form(user.calculation_mode);
                self.state = FlowState::Azimuth { user };
                form
            }
            Err(errors) => {
                self.state = FlowState::User;
                user_form().with_errors(errors)
            }
        }
    }

    fn step_azimuth(&mut self, user: UserStepInput, input: Value) -> FlowStep {
        let mode = user.calculation_mode;
        match parse_azimuth(input) {
            Ok(azimuth) if mode == CalculationMode::Precise => {
                self.state = FlowState::PreciseExtra { user, azimuth };
                precise_extra_form()
            }
            Ok(azimuth) => {
                self.state = FlowState::Finished;
                create_entry(user, azimuth, None)
            }
            Err(errors) => {
                self.state = FlowState::Azimuth { user };
                azimuth_form(mode).with_errors(errors)
            }
        }
    }

    fn step_precise_extra(
        &mut self,
        user: UserStepInput,
        azimuth: AzimuthStepInput,
        input: Value,
    ) -> FlowStep {
        match parse_precise_extra(input) {
            Ok(extra) => {
                self.state = FlowState::Finished;
                create_entry(user, azimuth, Some(extra))
            }
            Err(errors) => {
                self.state = FlowState::PreciseExtra { user, azimuth };
                precise_extra_form().with_errors(errors)
            }
        }
    }
}

#[async_trait]
impl ConfigFlow for WindowBuddyFlow {
    fn initial_step(&self) -> &'static str {
        STEP_USER
    }

    async fn step(&mut self, step_id: &str, user_input: Option<Value>) -> Result<FlowStep, FlowError> {
        if matches!(self.state, FlowState::Finished) {
            return Ok(FlowStep::Abort {
                reason: "already_configured".to_string(),
            });
        }

        let expected = self.state.step_id();
        if step_id != expected {
            return Err(FlowError::StepMismatch {
                expected: expected.to_string(),
                got: step_id.to_string(),
            });
        }

        let Some(input) = user_input else {
            return Ok(self.current_form());
        };

        let step = match std::mem::replace(&mut self.state, FlowState::Finished) {
            FlowState::User => self.step_user(input),
            FlowState::Azimuth { user } => self.step_azimuth(user, input),
            FlowState::PreciseExtra { user, azimuth } => {
                self.step_precise_extra(user, azimuth, input)
            }
            FlowState::Finished => self.current_form(),
        };
        Ok(step)
    }
}

fn create_entry(
    user: UserStepInput,
    azimuth: AzimuthStepInput,
    extra: Option<PreciseExtraStepInput>,
) -> FlowStep {
    let data = WindowEntryData {
        name: user.name,
        calculation_mode: user.calculation_mode,
        entity_id: user.entity_id,
        azimuth: azimuth.azimuth,
        width: extra.map(|e| e.width),
        height: extra.map(|e| e.height),
        blockades: extra.map(|e| e.blockades).unwrap_or_default(),
    };

    FlowStep::CreateEntry {
        title: data.name.clone(),
        data: data.to_entry_data(),
    }
}

fn error(field: &str, key: &str) -> FormErrors {
    HashMap::from([(field.to_string(), key.to_string())])
}

/// Fields in `required` that are missing, null or blank
fn missing_fields(input: &Value, required: &[&str]) -> FormErrors {
    required
        .iter()
        .filter(|field| match input.get(**field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .map(|field| (field.to_string(), ERROR_REQUIRED.to_string()))
        .collect()
}

fn decode<T: DeserializeOwned>(input: Value, required: &[&str]) -> Result<T, FormErrors> {
    if !input.is_object() {
        return Err(error(ERROR_BASE, ERROR_INVALID_INPUT));
    }
    let missing = missing_fields(&input, required);
    if !missing.is_empty() {
        return Err(missing);
    }
    serde_json::from_value(input).map_err(|e| {
        debug!("Cannot decode step input: {}", e);
        error(ERROR_BASE, ERROR_INVALID_INPUT)
    })
}

fn parse_user(input: Value) -> Result<UserStepInput, FormErrors> {
    let mut user: UserStepInput = decode(input, &[CONF_NAME])?;
    user.name = user.name.trim().to_string();

    match user.entity_id.parse::<EntityId>() {
        Ok(id) if id.domain() == domains::SUN => Ok(user),
        _ => Err(error(CONF_ENTITY_ID, ERROR_INVALID_ENTITY)),
    }
}

fn parse_azimuth(input: Value) -> Result<AzimuthStepInput, FormErrors> {
    let azimuth: AzimuthStepInput = decode(input, &[CONF_AZIMUTH])?;
    WindowConfig::simple(azimuth.azimuth)
        .map(|_| azimuth)
        .map_err(|_| error(CONF_AZIMUTH, ERROR_INVALID_AZIMUTH))
}

fn parse_precise_extra(input: Value) -> Result<PreciseExtraStepInput, FormErrors> {
    let extra: PreciseExtraStepInput = decode(input, &[CONF_WIDTH, CONF_HEIGHT])?;

    let errors: FormErrors = [(CONF_WIDTH, extra.width), (CONF_HEIGHT, extra.height)]
        .into_iter()
        .filter(|(_, value)| !(value.is_finite() && *value > 0.0))
        .map(|(field, _)| (field.to_string(), ERROR_INVALID_DIMENSION.to_string()))
        .collect();

    if errors.is_empty() {
        Ok(extra)
    } else {
        Err(errors)
    }
}

fn user_form() -> FlowStep {
    FlowStep::form(
        STEP_USER,
        vec![
            FormField::required(CONF_NAME, Selector::Text {}),
            FormField::required(
                CONF_CALCULATION_MODE,
                Selector::Select {
                    options: CalculationMode::ALL
                        .iter()
                        .map(|m| m.as_str().to_string())
                        .collect(),
                    translation_key: Some(CONF_CALCULATION_MODE.to_string()),
                },
            )
            .with_default(CalculationMode::Simple.as_str()),
            FormField::required(
                CONF_ENTITY_ID,
                Selector::Entity {
                    domain: vec![domains::SUN.to_string()],
                },
            )
            .with_default(DEFAULT_SUN_ENTITY),
        ],
        false,
    )
}

fn azimuth_form(mode: CalculationMode) -> FlowStep {
    FlowStep::form(
        STEP_AZIMUTH,
        vec![FormField::required(
            CONF_AZIMUTH,
            Selector::Number {
                unit_of_measurement: Some("°".to_string()),
                step: 1.0,
                mode: NumberSelectorMode::Box,
                min: Some(0.0),
                max: Some(360.0),
            },
        )],
        mode == CalculationMode::Simple,
    )
}

fn precise_extra_form() -> FlowStep {
    let distance = || Selector::number_box(0.1);
    let angle = || Selector::number_box(1.0);

    let mut schema = vec![
        FormField::required(CONF_WIDTH, distance()),
        FormField::required(CONF_HEIGHT, distance()),
    ];
    for (side, away, angle_field) in [
        (BLOCK_LEFT_SIDE, BLOCK_LEFT_AWAY, BLOCK_LEFT_ANGLE),
        (BLOCK_RIGHT_SIDE, BLOCK_RIGHT_AWAY, BLOCK_RIGHT_ANGLE),
        (BLOCK_TOP_SIDE, BLOCK_TOP_AWAY, BLOCK_TOP_ANGLE),
        (BLOCK_BOTTOM_SIDE, BLOCK_BOTTOM_AWAY, BLOCK_BOTTOM_ANGLE),
    ] {
        schema.push(FormField::optional(side, distance()));
        schema.push(FormField::optional(away, distance()));
        schema.push(FormField::optional(angle_field, angle()));
    }

    FlowStep::form(STEP_PRECISE_EXTRA, schema, true)
}
