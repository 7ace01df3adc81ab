//! Core types for the Window Buddy host
//!
//! The host keeps entity states keyed by `domain.object_id`. This crate
//! provides the id type, the state record, and the well-known state values
//! integrations compare against.

mod entity_id;
mod state;

pub use entity_id::{slugify, EntityId, EntityIdError};
pub use state::{Attributes, State};

/// State value of an entity whose source cannot be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value of an entity whose value is not known yet
pub const STATE_UNKNOWN: &str = "unknown";

/// Attribute holding the display name of an entity
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";

/// Attribute holding the unit a numeric state is expressed in
pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";

/// Well-known domains
pub mod domains {
    pub const SENSOR: &str = "sensor";
    pub const SUN: &str = "sun";
}
