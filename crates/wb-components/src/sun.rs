//! Sun Component
//!
//! Publishes `sun.sun` with the current solar azimuth and elevation for the
//! home location. Window sensors read their sun position from this entity.
//!
//! Position uses the low-precision NOAA approximation: day of year, equation
//! of time, declination, hour angle, and from those the zenith and azimuth.
//! It is accurate to well under a degree, enough for exposure estimates.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::json;
use tracing::{debug, trace};
use wb_core::{domains, Attributes, EntityId, EntityIdError, State, ATTR_FRIENDLY_NAME};
use wb_exposure::round2;
use wb_state_machine::StateMachine;

/// Object id of the published entity
pub const OBJECT_ID: &str = "sun";

pub const STATE_ABOVE_HORIZON: &str = "above_horizon";
pub const STATE_BELOW_HORIZON: &str = "below_horizon";

pub const ATTR_AZIMUTH: &str = "azimuth";
pub const ATTR_ELEVATION: &str = "elevation";
pub const ATTR_RISING: &str = "rising";

const EARTH_AXIAL_TILT: f64 = 23.45;
const DEGREES_PER_HOUR: f64 = 15.0;

/// Solar position at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Degrees clockwise from north, in `[0, 360)`
    pub azimuth: f64,
    /// Degrees above the horizon, negative below
    pub elevation: f64,
    /// Degrees, negative before solar noon
    pub hour_angle: f64,
    pub declination: f64,
}

impl SolarPosition {
    pub fn is_above_horizon(&self) -> bool {
        self.elevation >= 0.0
    }

    pub fn is_rising(&self) -> bool {
        self.hour_angle < 0.0
    }
}

fn equation_of_time(day_of_year: u32) -> f64 {
    let b = ((day_of_year as f64 - 1.0) * (360.0 / 365.0)).to_radians();
    229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.040849 * (2.0 * b).sin())
}

fn declination(day_of_year: u32) -> f64 {
    EARTH_AXIAL_TILT * (360.0 * (284.0 + day_of_year as f64) / 365.0).to_radians().sin()
}

/// Compute the sun's position for a location at a UTC instant
pub fn solar_position(latitude: f64, longitude: f64, at: DateTime<Utc>) -> SolarPosition {
    let n = at.ordinal();
    let utc_hours =
        at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0;

    let eot = equation_of_time(n);
    let decl = declination(n);
    let local_solar_time = (utc_hours + (4.0 * longitude + eot) / 60.0).rem_euclid(24.0);
    let hour_angle = DEGREES_PER_HOUR * (local_solar_time - 12.0);

    let lat = latitude.to_radians();
    let dec = decl.to_radians();
    let ha = hour_angle.to_radians();

    let cos_zenith = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
    let zenith = cos_zenith.clamp(-1.0, 1.0).acos().to_degrees();

    let sin_az = -dec.cos() * ha.sin();
    let cos_az = dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos();
    let azimuth = sin_az.atan2(cos_az).to_degrees().rem_euclid(360.0);

    SolarPosition {
        azimuth,
        elevation: 90.0 - zenith,
        hour_angle,
        declination: decl,
    }
}

/// The `sun.sun` entity for a fixed home location
#[derive(Debug, Clone)]
pub struct Sun {
    entity_id: EntityId,
    latitude: f64,
    longitude: f64,
}

impl Sun {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EntityIdError> {
        Ok(Self {
            entity_id: EntityId::new(domains::SUN, OBJECT_ID)?,
            latitude,
            longitude,
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Position for this location at `at`
    pub fn position(&self, at: DateTime<Utc>) -> SolarPosition {
        solar_position(self.latitude, self.longitude, at)
    }

    /// Recompute the position and publish it to the state machine
    pub fn update(&self, states: &StateMachine, at: DateTime<Utc>) -> State {
        let position = self.position(at);
        trace!(
            azimuth = position.azimuth,
            elevation = position.elevation,
            "Computed sun position"
        );

        let state = if position.is_above_horizon() {
            STATE_ABOVE_HORIZON
        } else {
            STATE_BELOW_HORIZON
        };

        let mut attributes = Attributes::new();
        attributes.insert(ATTR_AZIMUTH.to_string(), json!(round2(position.azimuth)));
        attributes.insert(ATTR_ELEVATION.to_string(), json!(round2(position.elevation)));
        attributes.insert(ATTR_RISING.to_string(), json!(position.is_rising()));
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), json!("Sun"));

        let published = states.set(self.entity_id.clone(), state, attributes);
        debug!("Updated {} = {}", self.entity_id, published.state);
        published
    }
}
