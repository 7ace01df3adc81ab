//! Exposure formulas
//!
//! Simple mode is a tent function over the window's field of view: 0 at
//! `azimuth ± 90°`, rising linearly to 100 when the sun faces the window
//! head-on. Precise mode is a provisional area model that weights the window
//! area by how close its facing is to due south.

use crate::window::{CalculationMode, SunPosition, WindowConfig};

/// Upper bound of every exposure value
pub const MAX_EXPOSURE: f64 = 100.0;

/// Half-width of the field of view in degrees
pub const FIELD_OF_VIEW_HALF: f64 = 90.0;

/// Facing treated as maximal exposure by precise mode
const PRECISE_PEAK_AZIMUTH: f64 = 180.0;

/// Estimate the sun exposure of a window in percent
///
/// Returns 0 when the sun position is unavailable or its azimuth is not finite.
pub fn compute_exposure(config: &WindowConfig, sun: Option<&SunPosition>) -> f64 {
    let Some(sun) = sun.filter(|s| s.azimuth.is_finite()) else {
        return 0.0;
    };

    match config.mode() {
        CalculationMode::Simple => simple_exposure(config.azimuth(), sun),
        CalculationMode::Precise => precise_exposure(config),
    }
}

/// Start and end of the field of view of a window facing `center`, in `[0, 360)`
pub fn field_of_view(center: f64) -> (f64, f64) {
    (
        (center - FIELD_OF_VIEW_HALF).rem_euclid(360.0),
        (center + FIELD_OF_VIEW_HALF).rem_euclid(360.0),
    )
}

/// Tent-shaped exposure peaking when the sun azimuth equals `center`
pub fn simple_exposure(center: f64, sun: &SunPosition) -> f64 {
    if !sun.is_above_horizon() {
        return 0.0;
    }

    // Lay start, center and end out on one line so the 0/360 seam disappears
    let (mut start, mut end) = field_of_view(center);
    if start > center {
        start -= 360.0;
    }
    if end < center {
        end += 360.0;
    }

    let mut azimuth = sun.azimuth;
    if azimuth < start {
        azimuth += 360.0;
    } else if azimuth > end {
        azimuth -= 360.0;
    }

    if azimuth < start || azimuth > end {
        return 0.0;
    }

    let exposure = if azimuth <= center {
        MAX_EXPOSURE * (azimuth - start) / (center - start)
    } else {
        MAX_EXPOSURE * (end - azimuth) / (end - center)
    };

    round2(exposure).clamp(0.0, MAX_EXPOSURE)
}

/// Window area weighted by orientation
///
/// Ignores elevation, the field of view and blockades. Simple windows have
/// no area and always yield 0.
pub fn precise_exposure(config: &WindowConfig) -> f64 {
    let Some(geometry) = config.geometry() else {
        return 0.0;
    };

    let angle_factor = (1.0
        - (config.azimuth() - PRECISE_PEAK_AZIMUTH).abs() / PRECISE_PEAK_AZIMUTH)
        .clamp(0.0, 1.0);

    round2(angle_factor * geometry.area()).clamp(0.0, MAX_EXPOSURE)
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::Blockades;

    fn sun(azimuth: f64) -> SunPosition {
        SunPosition::new(azimuth, Some(20.0))
    }

    #[test]
    fn test_unavailable_sun() {
        let window = WindowConfig::simple(180.0).unwrap();
        assert_eq!(compute_exposure(&window, None), 0.0);

        let window = WindowConfig::precise(180.0, 2.0, 3.0, Blockades::default()).unwrap();
        assert_eq!(compute_exposure(&window, None), 0.0);
    }

    #[test]
    fn test_non_finite_sun_is_unavailable() {
        let window = WindowConfig::simple(180.0).unwrap();
        for azimuth in [f64::NAN, f64::INFINITY] {
            assert_eq!(compute_exposure(&window, Some(&sun(azimuth))), 0.0);
        }
        let dusk = SunPosition::new(180.0, Some(f64::NAN));
        assert_eq!(compute_exposure(&window, Some(&dusk)), 0.0);
    }

    #[test]
    fn test_field_of_view() {
        assert_eq!(field_of_view(180.0), (90.0, 270.0));
        assert_eq!(field_of_view(10.0), (280.0, 100.0));
        assert_eq!(field_of_view(300.0), (210.0, 30.0));
    }

    #[test]
    fn test_peak_and_edges() {
        assert_eq!(simple_exposure(180.0, &sun(180.0)), 100.0);
        assert_eq!(simple_exposure(180.0, &sun(90.0)), 0.0);
        assert_eq!(simple_exposure(180.0, &sun(270.0)), 0.0);
        assert_eq!(simple_exposure(180.0, &sun(225.0)), 50.0);
    }

    #[test]
    fn test_outside_field_of_view() {
        assert_eq!(simple_exposure(180.0, &sun(0.0)), 0.0);
        assert_eq!(simple_exposure(180.0, &sun(45.0)), 0.0);
        assert_eq!(simple_exposure(180.0, &sun(300.0)), 0.0);
    }

    #[test]
    fn test_wraparound_rising_edge() {
        // start = 280, end = 100
        assert_eq!(simple_exposure(10.0, &sun(350.0)), 77.78);
        assert_eq!(simple_exposure(10.0, &sun(280.0)), 0.0);
        assert_eq!(simple_exposure(10.0, &sun(100.0)), 0.0);
        assert_eq!(simple_exposure(10.0, &sun(55.0)), 50.0);
    }

    #[test]
    fn test_wraparound_falling_edge() {
        assert_eq!(simple_exposure(350.0, &sun(10.0)), 77.78);
        assert_eq!(simple_exposure(350.0, &sun(80.0)), 0.0);
        assert_eq!(simple_exposure(350.0, &sun(120.0)), 0.0);
    }

    #[test]
    fn test_north_facing_window() {
        assert_eq!(simple_exposure(0.0, &sun(0.0)), 100.0);
        assert_eq!(simple_exposure(0.0, &sun(315.0)), 50.0);
        assert_eq!(simple_exposure(0.0, &sun(45.0)), 50.0);
        assert_eq!(simple_exposure(0.0, &sun(180.0)), 0.0);
    }

    #[test]
    fn test_below_horizon() {
        let night = SunPosition::new(180.0, Some(-5.0));
        assert_eq!(simple_exposure(180.0, &night), 0.0);

        let untracked = SunPosition::new(180.0, None);
        assert_eq!(simple_exposure(180.0, &untracked), 100.0);
    }

    #[test]
    fn test_rounding() {
        // 100 * 1/90 = 1.111..
        assert_eq!(simple_exposure(180.0, &sun(91.0)), 1.11);
        assert_eq!(round2(77.775_1), 77.78);
        assert_eq!(round2(-0.001), 0.0);
    }

    #[test]
    fn test_precise() {
        let south = WindowConfig::precise(180.0, 2.0, 3.0, Blockades::default()).unwrap();
        assert_eq!(compute_exposure(&south, Some(&sun(90.0))), 6.0);

        let north = WindowConfig::precise(0.0, 2.0, 3.0, Blockades::default()).unwrap();
        assert_eq!(compute_exposure(&north, Some(&sun(90.0))), 0.0);

        let east = WindowConfig::precise(90.0, 2.0, 3.0, Blockades::default()).unwrap();
        assert_eq!(compute_exposure(&east, Some(&sun(90.0))), 3.0);
    }

    #[test]
    fn test_precise_ignores_sun_elevation() {
        let window = WindowConfig::precise(180.0, 2.0, 3.0, Blockades::default()).unwrap();
        let night = SunPosition::new(0.0, Some(-30.0));
        assert_eq!(compute_exposure(&window, Some(&night)), 6.0);
    }

    #[test]
    fn test_precise_is_clamped() {
        let wall = WindowConfig::precise(180.0, 20.0, 10.0, Blockades::default()).unwrap();
        assert_eq!(compute_exposure(&wall, Some(&sun(180.0))), MAX_EXPOSURE);
    }

    #[test]
    fn test_precise_exposure_on_simple_window() {
        let window = WindowConfig::simple(180.0).unwrap();
        assert_eq!(precise_exposure(&window), 0.0);
    }
}
