//! Dose integration and melatonin suppression
//!
//! Dose is the time-integral of circadian stimulus in stimulus-hours. Each
//! sample stands for one bin whose width is the mean sampling interval.
//! Suppression follows `MSI = 1 - exp(-k * dose)`.

use crate::config::DoseConfig;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Lower and upper suppression predicted with `k -/+ dk`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Dose and suppression integrator
pub struct DoseIntegrator {
    config: DoseConfig,
}

impl DoseIntegrator {
    pub fn new(config: DoseConfig) -> Self {
        Self { config }
    }

    fn default_bin_hours(&self) -> f64 {
        self.config.default_bin_minutes / 60.0
    }

    /// Mean inter-sample interval in hours
    ///
    /// Falls back to the default bin with fewer than two samples or when the
    /// timestamps do not advance.
    pub fn bin_hours(&self, timestamps: &[DateTime<FixedOffset>]) -> f64 {
        if timestamps.len() < 2 {
            return self.default_bin_hours();
        }
        let (first, last) = (timestamps[0], timestamps[timestamps.len() - 1]);
        let span_hours = (last - first).num_milliseconds() as f64 / 3_600_000.0;
        let mean = span_hours / (timestamps.len() - 1) as f64;
        if mean > 0.0 && mean.is_finite() {
            mean
        } else {
            self.default_bin_hours()
        }
    }

    /// Dose contributed by each stimulus value
    pub fn increments(&self, stimulus: &[f64], bin_hours: f64) -> Vec<f64> {
        stimulus.iter().map(|cs| cs * bin_hours).collect()
    }

    /// Suppression for a dose using the configured sensitivity
    pub fn suppression(&self, dose: f64) -> f64 {
        suppression(dose, self.config.sensitivity)
    }

    pub fn suppression_bounds(&self, dose: f64) -> SuppressionBounds {
        suppression_bounds(
            dose,
            self.config.sensitivity,
            self.config.sensitivity_uncertainty,
        )
    }

    /// Fit the sensitivity from one observation, falling back to the configured value
    pub fn fit_sensitivity(&self, dose: f64, observed_msi: f64) -> f64 {
        fit_sensitivity(dose, observed_msi, self.config.sensitivity)
    }
}

pub fn total_dose(increments: &[f64]) -> f64 {
    increments.iter().sum()
}

/// `MSI = 1 - exp(-k * dose)`, clamped to `[0, 1]`
pub fn suppression(dose: f64, sensitivity: f64) -> f64 {
    (1.0 - (-sensitivity * dose.max(0.0)).exp()).clamp(0.0, 1.0)
}

/// Suppression evaluated at `k - dk` and `k + dk`
pub fn suppression_bounds(dose: f64, sensitivity: f64, uncertainty: f64) -> SuppressionBounds {
    let uncertainty = uncertainty.abs();
    SuppressionBounds {
        lower: suppression(dose, (sensitivity - uncertainty).max(0.0)),
        upper: suppression(dose, sensitivity + uncertainty),
    }
}

/// Invert the suppression model: `k = -ln(1 - MSI) / dose`
///
/// Non-positive dose or MSI outside `(0, 1)` returns `default`.
pub fn fit_sensitivity(dose: f64, observed_msi: f64, default: f64) -> f64 {
    if dose.is_nan() || dose <= 0.0 {
        return default;
    }
    if observed_msi.is_nan() || observed_msi <= 0.0 || observed_msi >= 1.0 {
        return default;
    }
    let k = -(1.0 - observed_msi).ln() / dose;
    if k.is_finite() && k > 0.0 {
        k
    } else {
        default
    }
}
