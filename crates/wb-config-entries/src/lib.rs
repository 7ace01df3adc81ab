//! Config Entries
//!
//! Config entries represent individual integration instances. This crate
//! holds the entry type and its lifecycle, the in-memory entry manager, and
//! the config flow framework that turns wizard input into new entries.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`ConfigFlow`] / [`FlowManager`] - Multi-step configuration wizards

pub mod entry;
pub mod flow;
pub mod manager;
mod state_machine;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, EntryData};
pub use flow::{
    ConfigFlow, FlowError, FlowFactory, FlowForm, FlowManager, FlowResult, FlowStep, FormField,
    NumberSelectorMode, Selector,
};
pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult, IntegrationHandler};
pub use state_machine::InvalidTransition;
