//! Window and sun position types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building a [`WindowConfig`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WindowConfigError {
    #[error("azimuth {0} is outside 0..=360 degrees")]
    AzimuthOutOfRange(f64),

    #[error("{field} must be a positive number, got {value}")]
    InvalidDimension { field: &'static str, value: f64 },

    #[error("{0} is required in precise mode")]
    MissingDimension(&'static str),

    #[error("unknown calculation mode '{0}'")]
    UnknownMode(String),
}

/// Formula used to estimate exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    /// Angular alignment between sun and window facing
    #[default]
    Simple,
    /// Window area weighted by orientation
    Precise,
}

impl CalculationMode {
    pub const ALL: [CalculationMode; 2] = [CalculationMode::Simple, CalculationMode::Precise];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMode::Simple => "simple",
            CalculationMode::Precise => "precise",
        }
    }
}

impl fmt::Display for CalculationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationMode {
    type Err = WindowConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(CalculationMode::Simple),
            "precise" => Ok(CalculationMode::Precise),
            other => Err(WindowConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Side of the window an obstruction sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockadeSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl BlockadeSide {
    pub const ALL: [BlockadeSide; 4] = [
        BlockadeSide::Left,
        BlockadeSide::Right,
        BlockadeSide::Top,
        BlockadeSide::Bottom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockadeSide::Left => "left",
            BlockadeSide::Right => "right",
            BlockadeSide::Top => "top",
            BlockadeSide::Bottom => "bottom",
        }
    }
}

/// An obstruction such as an overhang or a neighbouring wall
///
/// Distances use the same unit as the window dimensions. Every field is
/// optional because the user may only know part of the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Blockade {
    /// Distance from the window edge along the wall
    pub side_distance: Option<f64>,
    /// Distance the obstruction sticks out from the wall
    pub away_distance: Option<f64>,
    /// Angle of the obstruction in degrees
    pub angle: Option<f64>,
}

impl Blockade {
    pub fn is_empty(&self) -> bool {
        self.side_distance.is_none() && self.away_distance.is_none() && self.angle.is_none()
    }
}

/// Blockades on each side of a window
///
/// Captured at configuration time. The exposure formulas do not read them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Blockades {
    pub left: Option<Blockade>,
    pub right: Option<Blockade>,
    pub top: Option<Blockade>,
    pub bottom: Option<Blockade>,
}

impl Blockades {
    pub fn get(&self, side: BlockadeSide) -> Option<&Blockade> {
        match side {
            BlockadeSide::Left => self.left.as_ref(),
            BlockadeSide::Right => self.right.as_ref(),
            BlockadeSide::Top => self.top.as_ref(),
            BlockadeSide::Bottom => self.bottom.as_ref(),
        }
    }

    /// Store a blockade, dropping it when none of its fields are set
    pub fn set(&mut self, side: BlockadeSide, blockade: Blockade) {
        let slot = match side {
            BlockadeSide::Left => &mut self.left,
            BlockadeSide::Right => &mut self.right,
            BlockadeSide::Top => &mut self.top,
            BlockadeSide::Bottom => &mut self.bottom,
        };
        *slot = (!blockade.is_empty()).then_some(blockade);
    }

    pub fn is_empty(&self) -> bool {
        BlockadeSide::ALL.iter().all(|side| self.get(*side).is_none())
    }
}

/// Physical window description used by precise mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub blockades: Blockades,
}

impl WindowGeometry {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Immutable configuration of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    azimuth: f64,
    geometry: Option<WindowGeometry>,
}

impl WindowConfig {
    /// A window evaluated by angular alignment only
    pub fn simple(azimuth: f64) -> Result<Self, WindowConfigError> {
        Ok(Self {
            azimuth: normalize_azimuth(azimuth)?,
            geometry: None,
        })
    }

    /// A window evaluated from its size and orientation
    pub fn precise(
        azimuth: f64,
        width: f64,
        height: f64,
        blockades: Blockades,
    ) -> Result<Self, WindowConfigError> {
        Ok(Self {
            azimuth: normalize_azimuth(azimuth)?,
            geometry: Some(WindowGeometry {
                width: positive("width", width)?,
                height: positive("height", height)?,
                blockades,
            }),
        })
    }

    /// Compass direction the window faces, in `[0, 360)`
    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    pub fn mode(&self) -> CalculationMode {
        match self.geometry {
            Some(_) => CalculationMode::Precise,
            None => CalculationMode::Simple,
        }
    }

    pub fn geometry(&self) -> Option<&WindowGeometry> {
        self.geometry.as_ref()
    }

    pub fn width(&self) -> Option<f64> {
        self.geometry.map(|g| g.width)
    }

    pub fn height(&self) -> Option<f64> {
        self.geometry.map(|g| g.height)
    }
}

fn normalize_azimuth(azimuth: f64) -> Result<f64, WindowConfigError> {
    if !azimuth.is_finite() || !(0.0..=360.0).contains(&azimuth) {
        return Err(WindowConfigError::AzimuthOutOfRange(azimuth));
    }
    Ok(azimuth.rem_euclid(360.0))
}

fn positive(field: &'static str, value: f64) -> Result<f64, WindowConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(WindowConfigError::InvalidDimension { field, value })
    }
}

/// Sun position read from the sun-tracking entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    /// Degrees clockwise from north, in `[0, 360)`
    pub azimuth: f64,
    /// Degrees above the horizon; `None` when the source does not report it
    pub elevation: Option<f64>,
}

impl SunPosition {
    pub fn new(azimuth: f64, elevation: Option<f64>) -> Self {
        Self {
            azimuth: azimuth.rem_euclid(360.0),
            elevation,
        }
    }

    /// False only when elevation is reported and negative
    pub fn is_above_horizon(&self) -> bool {
        self.elevation.map_or(true, |e| e >= 0.0)
    }
}
