//! Config Flows
//!
//! A config flow is a wizard made of named steps. Each step either shows a
//! form, creates a config entry from the collected input, or aborts. The
//! [`FlowManager`] keeps the flows in progress and hands created entries to
//! [`ConfigEntries`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::{ConfigEntry, ConfigEntrySource, EntryData};
use crate::manager::ConfigEntries;

/// Config flow errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("No config flow registered for {0}")]
    UnknownHandler(String),

    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Flow is waiting for step {expected}, not {got}")]
    StepMismatch { expected: String, got: String },
}

/// Number input display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberSelectorMode {
    Box,
    Slider,
}

/// Input widget of a form field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Text {},
    Entity {
        domain: Vec<String>,
    },
    Select {
        options: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        translation_key: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        unit_of_measurement: Option<String>,
        step: f64,
        mode: NumberSelectorMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
}

impl Selector {
    /// Numeric box input with the given step
    pub fn number_box(step: f64) -> Self {
        Selector::Number {
            unit_of_measurement: None,
            step,
            mode: NumberSelectorMode::Box,
            min: None,
            max: None,
        }
    }
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    pub selector: Selector,
}

impl FormField {
    pub fn required(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
            selector,
        }
    }

    pub fn optional(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            required: false,
            ..Self::required(name, selector)
        }
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A form shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowForm {
    pub step_id: String,
    pub data_schema: Vec<FormField>,
    /// Field name -> error key from the previous submission
    pub errors: HashMap<String, String>,
    /// Whether submitting this form finishes the flow
    pub last_step: bool,
}

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowStep {
    Form(FlowForm),
    CreateEntry { title: String, data: EntryData },
    Abort { reason: String },
}

impl FlowStep {
    pub fn form(step_id: impl Into<String>, data_schema: Vec<FormField>, last_step: bool) -> Self {
        FlowStep::Form(FlowForm {
            step_id: step_id.into(),
            data_schema,
            errors: HashMap::new(),
            last_step,
        })
    }

    /// Attach errors to a form; other outcomes are returned unchanged
    pub fn with_errors(self, errors: HashMap<String, String>) -> Self {
        match self {
            FlowStep::Form(mut form) => {
                form.errors = errors;
                FlowStep::Form(form)
            }
            other => other,
        }
    }

    pub fn step_id(&self) -> Option<&str> {
        match self {
            FlowStep::Form(form) => Some(&form.step_id),
            _ => None,
        }
    }
}

/// Result returned to the caller of the flow manager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Integration domain
    pub handler: String,
    #[serde(flatten)]
    pub step: FlowStep,
    /// Id of the entry created by a `create_entry` result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
}

/// A configuration wizard of one integration
#[async_trait]
pub trait ConfigFlow: Send {
    /// Schema version of the entries this flow creates
    fn version(&self) -> u32 {
        1
    }

    /// Step the flow starts with
    fn initial_step(&self) -> &'static str {
        "user"
    }

    /// Run `step_id` with the user's input, or show its form when `None`
    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowStep, FlowError>;
}

/// Creates a fresh flow instance for each started flow
pub type FlowFactory = Arc<dyn Fn() -> Box<dyn ConfigFlow> + Send + Sync>;

/// Active flow state
struct ActiveFlow {
    handler: String,
    source: ConfigEntrySource,
    flow: Box<dyn ConfigFlow>,
    /// Step whose form is currently shown
    current_step: String,
}

/// Manages configuration flows in progress
pub struct FlowManager {
    entries: Arc<ConfigEntries>,
    factories: DashMap<String, FlowFactory>,
    flows: Mutex<HashMap<String, ActiveFlow>>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            factories: DashMap::new(),
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Register the config flow of an integration
    pub fn register(&self, domain: impl Into<String>, factory: FlowFactory) {
        let domain = domain.into();
        debug!("Registered config flow for {}", domain);
        self.factories.insert(domain, factory);
    }

    /// Start a new flow and return its first step
    pub async fn start_flow(
        &self,
        handler: &str,
        source: ConfigEntrySource,
    ) -> Result<FlowResult, FlowError> {
        let factory = self
            .factories
            .get(handler)
            .map(|f| f.value().clone())
            .ok_or_else(|| FlowError::UnknownHandler(handler.to_string()))?;

        let flow = factory();
        let step_id = flow.initial_step().to_string();
        let active = ActiveFlow {
            handler: handler.to_string(),
            source,
            flow,
            current_step: step_id.clone(),
        };
        let flow_id = Ulid::new().to_string();
        info!("Starting config flow {} for {}", flow_id, handler);

        self.run_step(flow_id, active, &step_id, None).await
    }

    /// Continue a flow with user input for its current step
    pub async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError> {
        let active = self
            .flows
            .lock()
            .await
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;
        let step_id = active.current_step.clone();

        self.run_step(flow_id.to_string(), active, &step_id, user_input)
            .await
    }

    /// Drop a flow without creating an entry
    pub async fn abort_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        if self.flows.lock().await.remove(flow_id).is_none() {
            return Err(FlowError::UnknownFlow(flow_id.to_string()));
        }
        debug!("Aborted config flow {}", flow_id);
        Ok(())
    }

    /// Flows in progress as `(flow_id, handler, step_id)`
    pub async fn list_flows(&self) -> Vec<(String, String, String)> {
        self.flows
            .lock()
            .await
            .iter()
            .map(|(id, f)| (id.clone(), f.handler.clone(), f.current_step.clone()))
            .collect()
    }

    async fn run_step(
        &self,
        flow_id: String,
        mut active: ActiveFlow,
        step_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError> {
        let step = match active.flow.step(step_id, user_input).await {
            Ok(step) => step,
            Err(e) => {
                warn!("Config flow {} failed at step {}: {}", flow_id, step_id, e);
                // The flow stays usable at its current step
                self.flows.lock().await.insert(flow_id, active);
                return Err(e);
            }
        };

        let mut result = FlowResult {
            flow_id: flow_id.clone(),
            handler: active.handler.clone(),
            step,
            entry_id: None,
        };

        match &result.step {
            FlowStep::Form(form) => {
                debug!("Flow {} shows step {}", flow_id, form.step_id);
                active.current_step = form.step_id.clone();
                self.flows.lock().await.insert(flow_id, active);
            }
            FlowStep::CreateEntry { title, data } => {
                let entry = ConfigEntry::new(&active.handler, title)
                    .with_data(data.clone())
                    .with_source(active.source)
                    .with_version(active.flow.version());
                let entry = self.entries.add(entry);
                result.entry_id = Some(entry.entry_id);
            }
            FlowStep::Abort { reason } => {
                info!("Flow {} for {} aborted: {}", flow_id, active.handler, reason);
            }
        }

        Ok(result)
    }
}
