//! Window sun exposure
//!
//! Estimates how much direct sun a window receives from its configured
//! orientation and the current sun position. The result is a percentage in
//! `[0, 100]`, recomputed on every call.
//!
//! # Example
//!
//! ```
//! use wb_exposure::{compute_exposure, SunPosition, WindowConfig};
//!
//! let window = WindowConfig::simple(180.0).unwrap();
//! let sun = SunPosition::new(135.0, Some(30.0));
//! assert_eq!(compute_exposure(&window, Some(&sun)), 50.0);
//! assert_eq!(compute_exposure(&window, None), 0.0);
//! ```

mod exposure;
mod window;

pub use exposure::{
    compute_exposure, field_of_view, precise_exposure, round2, simple_exposure, FIELD_OF_VIEW_HALF,
    MAX_EXPOSURE,
};
pub use window::{
    Blockade, BlockadeSide, Blockades, CalculationMode, SunPosition, WindowConfig,
    WindowConfigError, WindowGeometry,
};
