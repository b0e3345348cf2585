//! Phase-response integration
//!
//! Each exposure shifts the circadian clock by
//! `weight(hour) * scaling(hour) * dose_increment` hours, where the weight
//! comes from a 24-entry phase-response table (positive = advance,
//! negative = delay) and scaling depends on the morning/evening window.

use crate::config::PhaseConfig;
use crate::error::ComputeError;
use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

/// Direction of a net phase shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDirection {
    Negligible,
    Advance,
    Delay,
}

/// Human-facing reading of a phase shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInterpretation {
    pub direction: PhaseDirection,
    /// Absolute magnitude (minutes)
    pub minutes: f64,
    pub description: String,
}

/// Phase-response curve integrator
pub struct PhaseResponseCurve {
    config: PhaseConfig,
}

/// Whether `hour` lies in `[start, end)`, wrapping past midnight when `start > end`
fn in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

impl PhaseResponseCurve {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    pub fn weight(&self, hour: u32) -> f64 {
        self.config.weights[(hour % 24) as usize]
    }

    /// Time-of-day scaling for an hour
    pub fn scaling_factor(&self, hour: u32) -> f64 {
        let c = &self.config;
        if in_window(hour, c.morning_start_hour, c.morning_end_hour) {
            c.morning_factor
        } else if in_window(hour, c.evening_start_hour, c.evening_end_hour) {
            c.evening_factor
        } else {
            c.midday_factor
        }
    }

    /// Phase shift (hours) from one exposure
    pub fn shift(&self, timestamp: &DateTime<FixedOffset>, dose_increment: f64) -> f64 {
        let hour = timestamp.hour();
        self.weight(hour) * self.scaling_factor(hour) * dose_increment
    }

    /// Net phase shift over parallel timestamp and dose arrays
    pub fn cumulative(
        &self,
        timestamps: &[DateTime<FixedOffset>],
        doses: &[f64],
    ) -> Result<f64, ComputeError> {
        if timestamps.len() != doses.len() {
            return Err(ComputeError::LengthMismatch {
                timestamps: timestamps.len(),
                doses: doses.len(),
            });
        }
        Ok(timestamps
            .iter()
            .zip(doses)
            .map(|(ts, dose)| self.shift(ts, *dose))
            .sum())
    }

    pub fn interpret(&self, shift_hours: f64) -> PhaseInterpretation {
        interpret_shift(shift_hours, self.config.negligible_minutes)
    }
}

/// Classify a shift as negligible, advance or delay with a readable magnitude
pub fn interpret_shift(shift_hours: f64, negligible_minutes: f64) -> PhaseInterpretation {
    let minutes = (shift_hours * 60.0).abs();
    if !minutes.is_finite() || minutes < negligible_minutes {
        return PhaseInterpretation {
            direction: PhaseDirection::Negligible,
            minutes: if minutes.is_finite() { minutes } else { 0.0 },
            description: format!("Negligible shift (under {negligible_minutes:.0} min)"),
        };
    }

    let (direction, label) = if shift_hours > 0.0 {
        (PhaseDirection::Advance, "Advance")
    } else {
        (PhaseDirection::Delay, "Delay")
    };
    let magnitude = if minutes >= 60.0 {
        format!("{:.1} h", minutes / 60.0)
    } else {
        format!("{minutes:.0} min")
    };

    PhaseInterpretation {
        direction,
        minutes,
        description: format!("{label} of {magnitude}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn prc() -> PhaseResponseCurve {
        PhaseResponseCurve::new(PhaseConfig::default())
    }

    fn at(hour: u32) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(&format!("2024-01-15T{hour:02}:30:00+02:00")).unwrap()
    }

    #[test]
    fn test_curve_shape() {
        let p = prc();
        let strongest_delay = (0..24).min_by(|a, b| p.weight(*a).total_cmp(&p.weight(*b)));
        let strongest_advance = (0..24).max_by(|a, b| p.weight(*a).total_cmp(&p.weight(*b)));
        assert_eq!(strongest_delay, Some(2));
        assert_eq!(strongest_advance, Some(8));
        assert!(p.weight(6) < 0.0 && p.weight(7) > 0.0);
        assert!(p.weight(13).abs() < 0.1);
        assert!(p.weight(22) < p.weight(18));
    }

    #[test]
    fn test_scaling_windows() {
        let p = prc();
        assert_eq!(p.scaling_factor(8), 1.0);
        assert_eq!(p.scaling_factor(14), 0.5);
        assert_eq!(p.scaling_factor(20), 0.9);
        // Evening window wraps past midnight
        assert_eq!(p.scaling_factor(2), 0.9);
        assert_eq!(p.scaling_factor(5), 1.0);
    }

    #[test]
    fn test_shift_uses_local_hour() {
        let p = prc();
        // 08:30 at +02:00 is local hour 8: advance peak
        assert_abs_diff_eq!(p.shift(&at(8), 0.5), 0.5, epsilon = 1e-12);
        // 02:30 local: delay peak, evening scaling
        assert_abs_diff_eq!(p.shift(&at(2), 0.5), -0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_cumulative_sums_exposures() {
        let p = prc();
        let total = p.cumulative(&[at(8), at(2)], &[0.5, 0.5]).unwrap();
        assert_abs_diff_eq!(total, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_cumulative_length_mismatch() {
        let result = prc().cumulative(&[at(8), at(9)], &[0.1]);
        match result {
            Err(ComputeError::LengthMismatch { timestamps, doses }) => {
                assert_eq!((timestamps, doses), (2, 1));
            }
            other => panic!("expected length mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_cumulative_empty_is_zero() {
        assert_eq!(prc().cumulative(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_interpretation() {
        let p = prc();
        assert_eq!(p.interpret(0.05).direction, PhaseDirection::Negligible);
        assert_eq!(p.interpret(-0.09).direction, PhaseDirection::Negligible);

        let advance = p.interpret(0.25);
        assert_eq!(advance.direction, PhaseDirection::Advance);
        assert_eq!(advance.description, "Advance of 15 min");

        let delay = p.interpret(-1.5);
        assert_eq!(delay.direction, PhaseDirection::Delay);
        assert_eq!(delay.description, "Delay of 1.5 h");
        assert_abs_diff_eq!(delay.minutes, 90.0, epsilon = 1e-9);
    }
}
