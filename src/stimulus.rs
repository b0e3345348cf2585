//! Melanopic illuminance and circadian stimulus
//!
//! Per sample: illuminance at the eye is ambient light plus the screen's
//! contribution (brightness lookup corrected for viewing distance and angle).
//! Inside a sleep episode the result is attenuated. The light-type ratio turns
//! it into melanopic illuminance, which a saturating exponential maps to
//! circadian stimulus.

use crate::config::{StimulusConfig, StimulusModel};
use crate::types::{LightType, Sample};
use std::f64::consts::FRAC_PI_2;

/// Melanopic lux at which the linear model reaches CS = 1
const LINEAR_MODEL_FULL_SCALE_LUX: f64 = 1000.0;

/// Stimulus values for a single sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StimulusReading {
    /// Illuminance at the eye after screen and sleep adjustments (lux)
    pub illuminance: f64,
    pub melanopic_lux: f64,
    pub circadian_stimulus: f64,
}

/// Melanopic and circadian stimulus engine
pub struct StimulusEngine {
    config: StimulusConfig,
    sleep_attenuation: f64,
}

impl StimulusEngine {
    pub fn new(config: StimulusConfig, sleep_attenuation: f64) -> Self {
        Self {
            config,
            sleep_attenuation,
        }
    }

    pub fn config(&self) -> &StimulusConfig {
        &self.config
    }

    /// Inverse-square correction for the actual viewing distance
    pub fn distance_factor(&self) -> f64 {
        let geometry = &self.config.geometry;
        (geometry.reference_distance_cm / geometry.viewing_distance_cm).powi(2)
    }

    /// Screen illuminance at the eye for a sample; zero when the screen is off
    pub fn screen_contribution(&self, sample: &Sample) -> f64 {
        if !sample.screen_on {
            return 0.0;
        }
        match sample.screen_brightness {
            Some(brightness) => self.screen_lux(brightness, sample.pitch_rad),
            None => 0.0,
        }
    }

    /// Screen illuminance at the eye for a brightness fraction and optional pitch
    pub fn screen_lux(&self, brightness: f64, pitch_rad: Option<f64>) -> f64 {
        let base = self.config.brightness_table.lookup(brightness.clamp(0.0, 1.0));
        base * self.distance_factor() * angle_factor(pitch_rad)
    }

    /// Ambient plus screen illuminance, before any sleep attenuation
    pub fn total_illuminance(&self, sample: &Sample) -> f64 {
        sample.ambient_lux + self.screen_contribution(sample)
    }

    pub fn melanopic(&self, illuminance: f64, light_type: LightType) -> f64 {
        illuminance * self.config.melanopic_ratios.ratio_for(light_type)
    }

    /// Circadian stimulus using the configured model
    pub fn circadian_stimulus(&self, melanopic_lux: f64) -> f64 {
        match self.config.model {
            StimulusModel::Exponential => {
                cs_exponential(melanopic_lux, self.config.steepness, self.config.ceiling)
            }
            StimulusModel::Linear => cs_linear(melanopic_lux, self.config.ceiling),
        }
    }

    /// Evaluate one sample
    pub fn evaluate(&self, sample: &Sample, in_sleep: bool, light_type: LightType) -> StimulusReading {
        let mut illuminance = self.total_illuminance(sample);
        if in_sleep {
            illuminance *= self.sleep_attenuation;
        }
        let melanopic_lux = self.melanopic(illuminance, light_type);
        StimulusReading {
            illuminance,
            melanopic_lux,
            circadian_stimulus: self.circadian_stimulus(melanopic_lux),
        }
    }

    /// Fit the steepness from one observation, falling back to the configured value
    pub fn fit_steepness(&self, melanopic_lux: f64, observed_cs: f64) -> f64 {
        fit_steepness(
            melanopic_lux,
            observed_cs,
            self.config.ceiling,
            self.config.steepness,
        )
    }
}

/// Lambert cosine factor for a device pitch
///
/// A pitch of pi/2 faces the user; missing pitch counts as perpendicular.
pub fn angle_factor(pitch_rad: Option<f64>) -> f64 {
    match pitch_rad {
        Some(pitch) if pitch.is_finite() => {
            let off_axis = (pitch - FRAC_PI_2).abs().clamp(0.0, FRAC_PI_2);
            off_axis.cos().clamp(0.0, 1.0)
        }
        _ => 1.0,
    }
}

/// `CS = ceiling * (1 - exp(-a * melanopic))`, clamped to `[0, ceiling]`
pub fn cs_exponential(melanopic_lux: f64, steepness: f64, ceiling: f64) -> f64 {
    let melanopic = melanopic_lux.max(0.0);
    (ceiling * (1.0 - (-steepness * melanopic).exp())).clamp(0.0, ceiling)
}

/// `CS = min(melanopic / 1000, ceiling)`
pub fn cs_linear(melanopic_lux: f64, ceiling: f64) -> f64 {
    (melanopic_lux.max(0.0) / LINEAR_MODEL_FULL_SCALE_LUX).min(ceiling)
}

/// Invert the exponential model for one (melanopic, CS) observation
///
/// `a = -ln(1 - CS / ceiling) / melanopic`. Degenerate observations
/// (non-positive illuminance, CS outside `(0, ceiling)`) return `default`.
pub fn fit_steepness(melanopic_lux: f64, observed_cs: f64, ceiling: f64, default: f64) -> f64 {
    if melanopic_lux.is_nan() || melanopic_lux <= 0.0 {
        return default;
    }
    if observed_cs.is_nan() || observed_cs <= 0.0 || observed_cs >= ceiling {
        return default;
    }
    let a = -(1.0 - observed_cs / ceiling).ln() / melanopic_lux;
    if a.is_finite() && a > 0.0 {
        a
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenGeometry;
    use approx::assert_abs_diff_eq;
    use chrono::DateTime;
    use proptest::prelude::*;

    fn engine() -> StimulusEngine {
        StimulusEngine::new(StimulusConfig::default(), 0.1)
    }

    fn sample(lux: f64) -> Sample {
        Sample::ambient(
            DateTime::parse_from_rfc3339("2024-01-15T20:00:00+00:00").unwrap(),
            lux,
        )
    }

    #[test]
    fn test_reference_calibration_100_lux_neutral() {
        let e = engine();
        let reading = e.evaluate(&sample(100.0), false, LightType::Neutral);
        assert_abs_diff_eq!(reading.melanopic_lux, 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(reading.circadian_stimulus, 0.1814, epsilon = 1e-3);
    }

    #[test]
    fn test_reference_calibration_1000_lux_cool() {
        let e = engine();
        let reading = e.evaluate(&sample(1000.0), false, LightType::Cool);
        assert_abs_diff_eq!(reading.melanopic_lux, 850.0, epsilon = 1e-9);
        assert!(reading.circadian_stimulus > 0.6);
        assert!(reading.circadian_stimulus < 0.7);
    }

    #[test]
    fn test_unknown_uses_default_ratio() {
        let e = engine();
        assert_abs_diff_eq!(e.melanopic(200.0, LightType::Unknown), 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_screen_at_reference_distance_perpendicular() {
        let e = engine();
        let s = sample(0.0).with_screen(0.5).with_pitch(FRAC_PI_2);
        assert_eq!(e.screen_contribution(&s), 40.0);
    }

    #[test]
    fn test_screen_at_50cm_scales_by_inverse_square() {
        let mut config = StimulusConfig::default();
        config.geometry = ScreenGeometry {
            reference_distance_cm: 35.0,
            viewing_distance_cm: 50.0,
        };
        let far = StimulusEngine::new(config, 0.1);
        let s = sample(0.0).with_screen(0.5);

        let ratio = far.screen_contribution(&s) / engine().screen_contribution(&s);
        assert_abs_diff_eq!(ratio, 0.49, epsilon = 1e-9);
    }

    #[test]
    fn test_screen_off_contributes_nothing() {
        let e = engine();
        let mut s = sample(10.0).with_screen(1.0);
        s.screen_on = false;
        assert_eq!(e.total_illuminance(&s), 10.0);
    }

    #[test]
    fn test_angle_factor() {
        assert_eq!(angle_factor(None), 1.0);
        assert_abs_diff_eq!(angle_factor(Some(FRAC_PI_2)), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(angle_factor(Some(0.0)), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            angle_factor(Some(FRAC_PI_2 - std::f64::consts::FRAC_PI_3)),
            0.5,
            epsilon = 1e-12
        );
        // Beyond a quarter turn the off-axis angle saturates
        assert_abs_diff_eq!(angle_factor(Some(-1.0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sleep_attenuation_is_exactly_ten_percent() {
        let e = engine();
        let s = sample(80.0).with_screen(0.75);
        let awake = e.evaluate(&s, false, LightType::Screen);
        let asleep = e.evaluate(&s, true, LightType::Screen);
        assert_abs_diff_eq!(asleep.illuminance, awake.illuminance * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_model() {
        assert_abs_diff_eq!(cs_linear(300.0, 0.7), 0.3, epsilon = 1e-12);
        assert_eq!(cs_linear(5000.0, 0.7), 0.7);

        let mut config = StimulusConfig::default();
        config.model = StimulusModel::Linear;
        let e = StimulusEngine::new(config, 0.1);
        assert_abs_diff_eq!(e.circadian_stimulus(250.0), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_steepness_roundtrip() {
        let a = fit_steepness(60.0, 0.1814, 0.7, 0.005);
        assert_abs_diff_eq!(cs_exponential(60.0, a, 0.7), 0.1814, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_steepness_degenerate_returns_default() {
        assert_eq!(fit_steepness(0.0, 0.3, 0.7, 0.005), 0.005);
        assert_eq!(fit_steepness(-5.0, 0.3, 0.7, 0.005), 0.005);
        assert_eq!(fit_steepness(100.0, 0.7, 0.7, 0.005), 0.005);
        assert_eq!(fit_steepness(100.0, 0.9, 0.7, 0.005), 0.005);
        assert_eq!(fit_steepness(f64::NAN, 0.3, 0.7, 0.005), 0.005);
        assert_eq!(engine().fit_steepness(0.0, 0.2), 0.005);
    }

    #[test]
    fn test_cs_at_zero() {
        assert_eq!(cs_exponential(0.0, 0.005, 0.7), 0.0);
    }

    proptest! {
        #[test]
        fn prop_melanopic_is_exact_product(lux in 0.0..1e5f64) {
            let e = engine();
            for light_type in LightType::all() {
                let ratio = e.config().melanopic_ratios.ratio_for(light_type);
                prop_assert_eq!(e.melanopic(lux, light_type), lux * ratio);
            }
        }

        #[test]
        fn prop_cs_bounded(mel in -1e3..1e7f64) {
            let cs = cs_exponential(mel, 0.005, 0.7);
            prop_assert!((0.0..=0.7).contains(&cs));
            let linear = cs_linear(mel, 0.7);
            prop_assert!((0.0..=0.7).contains(&linear));
        }

        #[test]
        fn prop_cs_non_decreasing(a in 0.0..1e5f64, b in 0.0..1e5f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(cs_exponential(lo, 0.005, 0.7) <= cs_exponential(hi, 0.005, 0.7));
        }

        #[test]
        fn prop_fit_roundtrip(mel in 1.0..5000.0f64, cs in 0.01..0.69f64) {
            let a = fit_steepness(mel, cs, 0.7, 0.005);
            prop_assert!((cs_exponential(mel, a, 0.7) - cs).abs() < 1e-9);
        }
    }
}
