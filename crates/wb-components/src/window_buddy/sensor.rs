//! Sun exposure sensor of one window

use serde_json::json;
use tracing::trace;
use wb_core::{Attributes, EntityId, State, ATTR_FRIENDLY_NAME, ATTR_UNIT_OF_MEASUREMENT};
use wb_exposure::{compute_exposure, SunPosition, WindowConfig};
use wb_state_machine::StateMachine;

use super::{WindowEntryData, CONF_AZIMUTH, CONF_CALCULATION_MODE, CONF_HEIGHT, CONF_WIDTH};
use crate::sun::{ATTR_AZIMUTH, ATTR_ELEVATION};

pub const UNIT_PERCENT: &str = "%";

/// Exposure sensor for a configured window
#[derive(Debug, Clone)]
pub struct WindowBuddySensor {
    unique_id: String,
    entity_id: EntityId,
    data: WindowEntryData,
    window: WindowConfig,
}

impl WindowBuddySensor {
    pub fn new(
        entry_id: &str,
        entity_id: EntityId,
        data: WindowEntryData,
        window: WindowConfig,
    ) -> Self {
        Self {
            unique_id: format!("{}_sun_exposure", entry_id),
            entity_id,
            data,
            window,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Entity the sun position is read from
    pub fn sun_entity_id(&self) -> &str {
        &self.data.entity_id
    }

    pub fn window(&self) -> &WindowConfig {
        &self.window
    }

    /// Current sun position, `None` when the sun entity cannot be used
    pub fn sun_position(&self, states: &StateMachine) -> Option<SunPosition> {
        let sun = states.get(self.sun_entity_id())?;
        if sun.is_unavailable() {
            return None;
        }
        let azimuth = sun.attribute_f64(ATTR_AZIMUTH)?;
        Some(SunPosition::new(azimuth, sun.attribute_f64(ATTR_ELEVATION)))
    }

    /// Exposure in percent; 0 when the sun is unavailable
    pub fn native_value(&self, states: &StateMachine) -> f64 {
        let sun = self.sun_position(states);
        if sun.is_none() {
            trace!("{} has no usable sun entity {}", self.entity_id, self.sun_entity_id());
        }
        compute_exposure(&self.window, sun.as_ref())
    }

    pub fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(
            CONF_CALCULATION_MODE.to_string(),
            json!(self.data.calculation_mode),
        );
        attributes.insert(CONF_AZIMUTH.to_string(), json!(self.data.azimuth));
        attributes.insert(CONF_WIDTH.to_string(), json!(self.data.width));
        attributes.insert(CONF_HEIGHT.to_string(), json!(self.data.height));
        attributes
    }

    /// Recompute the value and publish it to the state machine
    pub fn update(&self, states: &StateMachine) -> State {
        let value = self.native_value(states);

        let mut attributes = self.extra_state_attributes();
        attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), json!(UNIT_PERCENT));
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), json!(self.data.name));

        states.set(self.entity_id.clone(), format_number(value), attributes)
    }
}

/// Format a number for state display (remove trailing zeros)
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_buddy::{BlockadeFields, DEFAULT_SUN_ENTITY};
    use wb_core::STATE_UNAVAILABLE;
    use wb_exposure::{Blockades, CalculationMode};

    fn simple_sensor(azimuth: f64) -> WindowBuddySensor {
        let data = WindowEntryData {
            name: "Living Room".to_string(),
            calculation_mode: CalculationMode::Simple,
            entity_id: DEFAULT_SUN_ENTITY.to_string(),
            azimuth,
            width: None,
            height: None,
            blockades: BlockadeFields::default(),
        };
        let window = data.window_config().unwrap();
        WindowBuddySensor::new(
            "01HXENTRY",
            "sensor.living_room".parse().unwrap(),
            data,
            window,
        )
    }

    fn set_sun(states: &StateMachine, state: &str, azimuth: f64, elevation: f64) {
        states.set(
            "sun.sun".parse().unwrap(),
            state,
            Attributes::from([
                (ATTR_AZIMUTH.to_string(), json!(azimuth)),
                (ATTR_ELEVATION.to_string(), json!(elevation)),
            ]),
        );
    }

    #[test]
    fn test_unique_id_and_attributes() {
        let sensor = simple_sensor(180.0);
        assert_eq!(sensor.unique_id(), "01HXENTRY_sun_exposure");
        assert_eq!(sensor.name(), "Living Room");

        let attrs = sensor.extra_state_attributes();
        assert_eq!(attrs[CONF_CALCULATION_MODE], "simple");
        assert_eq!(attrs[CONF_AZIMUTH], 180.0);
        assert!(attrs[CONF_WIDTH].is_null());
        assert!(attrs[CONF_HEIGHT].is_null());
    }

    #[test]
    fn test_missing_or_unavailable_sun_is_zero() {
        let states = StateMachine::new();
        let sensor = simple_sensor(180.0);
        assert_eq!(sensor.native_value(&states), 0.0);

        set_sun(&states, STATE_UNAVAILABLE, 180.0, 30.0);
        assert_eq!(sensor.native_value(&states), 0.0);

        // Sun entity without an azimuth attribute
        states.set("sun.sun".parse().unwrap(), "above_horizon", Attributes::new());
        assert_eq!(sensor.native_value(&states), 0.0);
    }

    #[test]
    fn test_non_numeric_sun_azimuth_publishes_zero() {
        let states = StateMachine::new();
        let sensor = simple_sensor(180.0);
        states.set(
            "sun.sun".parse().unwrap(),
            "above_horizon",
            Attributes::from([
                (ATTR_AZIMUTH.to_string(), json!("NaN")),
                (ATTR_ELEVATION.to_string(), json!(10.0)),
            ]),
        );
        assert!(sensor.sun_position(&states).is_none());
        assert_eq!(sensor.update(&states).state, "0");
    }

    #[test]
    fn test_value_follows_sun() {
        let states = StateMachine::new();
        let sensor = simple_sensor(180.0);

        set_sun(&states, "above_horizon", 180.0, 40.0);
        assert_eq!(sensor.native_value(&states), 100.0);

        set_sun(&states, "above_horizon", 135.0, 40.0);
        assert_eq!(sensor.native_value(&states), 50.0);

        set_sun(&states, "below_horizon", 180.0, -5.0);
        assert_eq!(sensor.native_value(&states), 0.0);
    }

    #[test]
    fn test_wraparound_window() {
        let states = StateMachine::new();
        let sensor = simple_sensor(10.0);
        set_sun(&states, "above_horizon", 350.0, 10.0);
        assert_eq!(sensor.native_value(&states), 77.78);
    }

    #[test]
    fn test_precise_sensor() {
        let data = WindowEntryData {
            name: "Attic".to_string(),
            calculation_mode: CalculationMode::Precise,
            entity_id: DEFAULT_SUN_ENTITY.to_string(),
            azimuth: 180.0,
            width: Some(2.0),
            height: Some(3.0),
            blockades: BlockadeFields::default(),
        };
        let window = WindowConfig::precise(180.0, 2.0, 3.0, Blockades::default()).unwrap();
        let sensor = WindowBuddySensor::new("01HXATTIC", "sensor.attic".parse().unwrap(), data, window);

        let states = StateMachine::new();
        set_sun(&states, "above_horizon", 90.0, 20.0);
        assert_eq!(sensor.native_value(&states), 6.0);
        assert_eq!(sensor.extra_state_attributes()[CONF_WIDTH], 2.0);
    }

    #[test]
    fn test_update_publishes_state() {
        let states = StateMachine::new();
        let sensor = simple_sensor(180.0);
        set_sun(&states, "above_horizon", 135.0, 40.0);

        let state = sensor.update(&states);
        assert_eq!(state.state, "50");

        let stored = states.get("sensor.living_room").unwrap();
        assert_eq!(stored.attributes[ATTR_UNIT_OF_MEASUREMENT], "%");
        assert_eq!(stored.attributes[ATTR_FRIENDLY_NAME], "Living Room");

        set_sun(&states, "above_horizon", 350.0, 10.0);
        let window = simple_sensor(10.0);
        assert_eq!(window.update(&states).state, "77.78");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(77.78), "77.78");
    }
}
