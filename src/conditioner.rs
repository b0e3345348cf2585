//! Illuminance signal conditioning
//!
//! Cleans a raw lux stream one reading at a time:
//! - non-finite readings are rejected without touching state
//! - finite readings are clamped into the configured range
//! - micro-changes inside the dead-band collapse onto the smoothed value
//! - large jumps are blended toward the smoothed value before smoothing
//! - first-order exponential smoothing
//!
//! One `SignalConditioner` belongs to exactly one recording session.

use crate::config::ConditionerConfig;
use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Floor for the denominator of the fractional-change test (lux)
const OUTLIER_REFERENCE_FLOOR_LUX: f64 = 1.0;

/// Mutable smoothing state for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionerState {
    /// Last reading that passed validation (after clamping)
    pub last_valid: Option<f64>,
    /// Current smoothed illuminance
    pub smoothed: Option<f64>,
}

/// A conditioned reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionedReading {
    pub lux: f64,
    /// The raw value was outside the valid range and was clamped
    pub clamped: bool,
    /// The reading was damped as an outlier
    pub damped: bool,
}

/// Stateful illuminance conditioner
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    config: ConditionerConfig,
    state: ConditionerState,
}

impl SignalConditioner {
    pub fn new(config: ConditionerConfig) -> Self {
        Self {
            config,
            state: ConditionerState::default(),
        }
    }

    /// Resume from a previously captured state
    pub fn with_state(config: ConditionerConfig, state: ConditionerState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> ConditionerState {
        self.state
    }

    /// Forget all smoothing history; called at session start
    pub fn reset(&mut self) {
        self.state = ConditionerState::default();
    }

    /// Condition one raw reading.
    ///
    /// Returns `InvalidReading` for non-finite input; state is unchanged in
    /// that case and the caller is expected to skip the sample.
    pub fn condition(&mut self, raw_lux: f64) -> Result<ConditionedReading, ComputeError> {
        if !raw_lux.is_finite() {
            return Err(ComputeError::InvalidReading(raw_lux));
        }

        let (valid_lux, clamped) = self.clamp(raw_lux);
        let mut candidate = valid_lux;
        let mut damped = false;

        let smoothed = match self.state.smoothed {
            Some(prev) => {
                let delta = (candidate - prev).abs();
                if delta < self.config.dead_band_lux {
                    candidate = prev;
                } else if delta / prev.max(OUTLIER_REFERENCE_FLOOR_LUX)
                    > self.config.outlier_fraction
                {
                    let blend = self.config.outlier_blend;
                    candidate = blend * candidate + (1.0 - blend) * prev;
                    damped = true;
                }
                let alpha = self.config.smoothing_alpha;
                alpha * candidate + (1.0 - alpha) * prev
            }
            None => candidate,
        };

        self.state.last_valid = Some(valid_lux);
        self.state.smoothed = Some(smoothed);

        Ok(ConditionedReading {
            lux: smoothed,
            clamped,
            damped,
        })
    }

    fn clamp(&self, raw_lux: f64) -> (f64, bool) {
        let clamped = raw_lux.clamp(self.config.min_lux, self.config.max_lux);
        (clamped, clamped != raw_lux)
    }

    /// Range violation for a reading, if any, for reporting
    pub fn range_violation(&self, raw_lux: f64) -> Option<ComputeError> {
        if raw_lux.is_finite() && self.clamp(raw_lux).1 {
            Some(ComputeError::OutOfRangeReading {
                value: raw_lux,
                min: self.config.min_lux,
                max: self.config.max_lux,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn conditioner() -> SignalConditioner {
        SignalConditioner::new(ConditionerConfig::default())
    }

    #[test]
    fn test_first_reading_initializes_directly() {
        let mut c = conditioner();
        let out = c.condition(120.0).unwrap();
        assert_eq!(out.lux, 120.0);
        assert_eq!(c.state().smoothed, Some(120.0));
        assert_eq!(c.state().last_valid, Some(120.0));
    }

    #[test]
    fn test_non_finite_is_rejected_without_state_change() {
        let mut c = conditioner();
        c.condition(50.0).unwrap();
        let before = c.state();

        assert!(matches!(
            c.condition(f64::NAN),
            Err(ComputeError::InvalidReading(_))
        ));
        assert!(c.condition(f64::INFINITY).is_err());
        assert_eq!(c.state(), before);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let mut c = conditioner();
        let out = c.condition(-20.0).unwrap();
        assert!(out.clamped);
        assert_eq!(out.lux, 0.0);

        let mut c = conditioner();
        let out = c.condition(1_000_000.0).unwrap();
        assert!(out.clamped);
        assert_eq!(out.lux, 150_000.0);
        assert!(c.range_violation(1_000_000.0).is_some());
        assert!(c.range_violation(10.0).is_none());
    }

    #[test]
    fn test_dead_band_holds_value() {
        let mut c = conditioner();
        c.condition(100.0).unwrap();
        let out = c.condition(100.3).unwrap();
        assert_eq!(out.lux, 100.0);
    }

    #[test]
    fn test_exponential_smoothing() {
        let mut c = conditioner();
        c.condition(100.0).unwrap();
        let out = c.condition(200.0).unwrap();
        // 100% change, below the outlier threshold: 0.3 * 200 + 0.7 * 100
        assert_abs_diff_eq!(out.lux, 130.0, epsilon = 1e-9);
        assert!(!out.damped);
    }

    #[test]
    fn test_outlier_is_damped_not_discarded() {
        let mut c = conditioner();
        c.condition(100.0).unwrap();
        let out = c.condition(1000.0).unwrap();
        assert!(out.damped);
        // blended: 0.3 * 1000 + 0.7 * 100 = 370; smoothed: 0.3 * 370 + 0.7 * 100 = 181
        assert_abs_diff_eq!(out.lux, 181.0, epsilon = 1e-9);
    }

    #[test]
    fn test_real_step_is_eventually_tracked() {
        let mut c = conditioner();
        c.condition(10.0).unwrap();
        let mut last = 0.0;
        for _ in 0..60 {
            last = c.condition(800.0).unwrap().lux;
        }
        assert!((last - 800.0).abs() < 1.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut c = conditioner();
        c.condition(300.0).unwrap();
        c.reset();
        assert_eq!(c.state(), ConditionerState::default());
        assert_eq!(c.condition(5.0).unwrap().lux, 5.0);
    }

    #[test]
    fn test_resume_from_state() {
        let state = ConditionerState {
            last_valid: Some(40.0),
            smoothed: Some(40.0),
        };
        let mut c = SignalConditioner::with_state(ConditionerConfig::default(), state);
        let out = c.condition(40.2).unwrap();
        assert_eq!(out.lux, 40.0);
    }
}
