//! Pipeline configuration
//!
//! All model constants and reference tables live here as explicit, immutable
//! values. Components take a reference to the section they need at
//! construction; nothing reads process-wide state. Every section implements
//! `Default` with the calibrated defaults and deserializes with
//! `#[serde(default)]`, so a partial JSON document only overrides what it names.

use crate::error::ComputeError;
use crate::types::LightType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration for a Lumen pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    pub conditioner: ConditionerConfig,
    pub sleep: SleepConfig,
    pub stimulus: StimulusConfig,
    pub dose: DoseConfig,
    pub phase: PhaseConfig,
    pub classification: ClassificationConfig,
}

impl LumenConfig {
    /// Load a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: LumenConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Check every section for values the models cannot work with
    pub fn validate(&self) -> Result<(), ComputeError> {
        self.conditioner.validate()?;
        self.sleep.validate()?;
        self.stimulus.validate()?;
        self.dose.validate()?;
        self.phase.validate()?;
        self.classification.validate()?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ComputeError {
    ComputeError::InvalidConfig(msg.into())
}

fn require_fraction(name: &str, value: f64) -> Result<(), ComputeError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ComputeError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("{name} must be finite and >= 0, got {value}")));
    }
    Ok(())
}

fn require_hour(name: &str, value: u32) -> Result<(), ComputeError> {
    if value > 23 {
        return Err(invalid(format!("{name} must be an hour in 0..=23, got {value}")));
    }
    Ok(())
}

/// Illuminance signal conditioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionerConfig {
    /// Lower bound of the valid range (lux)
    pub min_lux: f64,
    /// Upper bound of the valid range (lux)
    pub max_lux: f64,
    /// Changes smaller than this are treated as noise (lux)
    pub dead_band_lux: f64,
    /// Fractional change above which a reading is damped as an outlier
    pub outlier_fraction: f64,
    /// Share of the new reading kept when damping an outlier
    pub outlier_blend: f64,
    /// Exponential smoothing coefficient
    pub smoothing_alpha: f64,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            min_lux: 0.0,
            max_lux: 150_000.0,
            dead_band_lux: 0.5,
            outlier_fraction: 3.0,
            outlier_blend: 0.3,
            smoothing_alpha: 0.3,
        }
    }
}

impl ConditionerConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        require_non_negative("conditioner.min_lux", self.min_lux)?;
        if !self.max_lux.is_finite() || self.max_lux <= self.min_lux {
            return Err(invalid(format!(
                "conditioner.max_lux ({}) must exceed min_lux ({})",
                self.max_lux, self.min_lux
            )));
        }
        require_non_negative("conditioner.dead_band_lux", self.dead_band_lux)?;
        require_non_negative("conditioner.outlier_fraction", self.outlier_fraction)?;
        require_fraction("conditioner.outlier_blend", self.outlier_blend)?;
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(invalid(format!(
                "conditioner.smoothing_alpha must be within (0, 1], got {}",
                self.smoothing_alpha
            )));
        }
        Ok(())
    }
}

/// Sleep episode detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    pub enabled: bool,
    /// Motion magnitude below which the device counts as still
    pub movement_threshold: f64,
    /// Ambient illuminance below which the room counts as dark (lux)
    pub lux_threshold: f64,
    /// Shortest run recorded as an episode (minutes)
    pub min_duration_minutes: f64,
    /// Factor applied to illuminance inside an episode
    pub attenuation: f64,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            movement_threshold: 0.05,
            lux_threshold: 5.0,
            min_duration_minutes: 20.0,
            attenuation: 0.1,
        }
    }
}

impl SleepConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        require_non_negative("sleep.movement_threshold", self.movement_threshold)?;
        require_non_negative("sleep.lux_threshold", self.lux_threshold)?;
        require_non_negative("sleep.min_duration_minutes", self.min_duration_minutes)?;
        require_fraction("sleep.attenuation", self.attenuation)
    }
}

/// Melanopic ratio per light-source category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelanopicRatios {
    pub ratios: BTreeMap<LightType, f64>,
    /// Ratio used for `LightType::Unknown` and any category missing from the table
    pub default_ratio: f64,
}

impl Default for MelanopicRatios {
    fn default() -> Self {
        let ratios = BTreeMap::from([
            (LightType::Warm, 0.45),
            (LightType::Neutral, 0.60),
            (LightType::Cool, 0.85),
            (LightType::Daylight, 0.95),
            (LightType::Screen, 0.75),
            (LightType::Incandescent, 0.42),
        ]);
        Self {
            ratios,
            default_ratio: 0.60,
        }
    }
}

impl MelanopicRatios {
    pub fn ratio_for(&self, light_type: LightType) -> f64 {
        match light_type {
            LightType::Unknown => self.default_ratio,
            other => self.ratios.get(&other).copied().unwrap_or(self.default_ratio),
        }
    }

    fn validate(&self) -> Result<(), ComputeError> {
        for (light_type, ratio) in &self.ratios {
            if !(*ratio > 0.0 && *ratio <= 1.0) {
                return Err(invalid(format!(
                    "melanopic ratio for {light_type} must be within (0, 1], got {ratio}"
                )));
            }
        }
        if !(self.default_ratio > 0.0 && self.default_ratio <= 1.0) {
            return Err(invalid(format!(
                "default melanopic ratio must be within (0, 1], got {}",
                self.default_ratio
            )));
        }
        Ok(())
    }
}

/// One calibration point: screen brightness fraction to illuminance at the reference distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrightnessAnchor {
    pub brightness: f64,
    pub lux: f64,
}

/// Piecewise-linear brightness to illuminance calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrightnessTable {
    pub anchors: Vec<BrightnessAnchor>,
}

impl Default for BrightnessTable {
    fn default() -> Self {
        let points = [(0.0, 0.0), (0.25, 12.0), (0.5, 40.0), (0.75, 80.0), (1.0, 130.0)];
        Self {
            anchors: points
                .iter()
                .map(|&(brightness, lux)| BrightnessAnchor { brightness, lux })
                .collect(),
        }
    }
}

impl BrightnessTable {
    /// Interpolate illuminance for a brightness fraction
    ///
    /// Values outside the anchor range take the nearest endpoint.
    pub fn lookup(&self, brightness: f64) -> f64 {
        let (first, last) = match (self.anchors.first(), self.anchors.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if !brightness.is_finite() || brightness <= first.brightness {
            return first.lux;
        }
        if brightness >= last.brightness {
            return last.lux;
        }

        for pair in self.anchors.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if brightness <= hi.brightness {
                let span = hi.brightness - lo.brightness;
                if span <= 0.0 {
                    return hi.lux;
                }
                let t = (brightness - lo.brightness) / span;
                return lo.lux + t * (hi.lux - lo.lux);
            }
        }
        last.lux
    }

    fn validate(&self) -> Result<(), ComputeError> {
        if self.anchors.is_empty() {
            return Err(invalid("brightness table needs at least one anchor"));
        }
        for anchor in &self.anchors {
            require_fraction("brightness anchor", anchor.brightness)?;
            require_non_negative("brightness anchor lux", anchor.lux)?;
        }
        if self
            .anchors
            .windows(2)
            .any(|pair| pair[1].brightness <= pair[0].brightness)
        {
            return Err(invalid("brightness anchors must be strictly increasing"));
        }
        Ok(())
    }
}

/// Viewing geometry for the screen contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenGeometry {
    /// Distance at which the brightness table was calibrated (cm)
    pub reference_distance_cm: f64,
    /// Assumed eye-to-screen distance during use (cm)
    pub viewing_distance_cm: f64,
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self {
            reference_distance_cm: 35.0,
            viewing_distance_cm: 35.0,
        }
    }
}

/// Circadian stimulus transfer function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusModel {
    /// `CS = ceiling * (1 - exp(-a * melanopic))`
    #[default]
    Exponential,
    /// `CS = min(melanopic / 1000, ceiling)`, for calibration runs
    Linear,
}

/// Melanopic and circadian stimulus model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub melanopic_ratios: MelanopicRatios,
    pub brightness_table: BrightnessTable,
    pub geometry: ScreenGeometry,
    /// Steepness `a` of the saturating exponential
    pub steepness: f64,
    /// Upper bound of circadian stimulus
    pub ceiling: f64,
    pub model: StimulusModel,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            melanopic_ratios: MelanopicRatios::default(),
            brightness_table: BrightnessTable::default(),
            geometry: ScreenGeometry::default(),
            steepness: 0.005,
            ceiling: 0.7,
            model: StimulusModel::Exponential,
        }
    }
}

impl StimulusConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        self.melanopic_ratios.validate()?;
        self.brightness_table.validate()?;
        if !(self.geometry.reference_distance_cm > 0.0 && self.geometry.viewing_distance_cm > 0.0)
        {
            return Err(invalid("viewing distances must be positive"));
        }
        if !(self.steepness > 0.0 && self.steepness.is_finite()) {
            return Err(invalid(format!(
                "stimulus.steepness must be positive, got {}",
                self.steepness
            )));
        }
        if !(self.ceiling > 0.0 && self.ceiling <= 1.0) {
            return Err(invalid(format!(
                "stimulus.ceiling must be within (0, 1], got {}",
                self.ceiling
            )));
        }
        Ok(())
    }
}

/// Dose integration and melatonin suppression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseConfig {
    /// Suppression sensitivity `k`
    pub sensitivity: f64,
    /// Uncertainty `dk` used for suppression bounds
    pub sensitivity_uncertainty: f64,
    /// Bin width when the sampling interval cannot be estimated (minutes)
    pub default_bin_minutes: f64,
}

impl Default for DoseConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.25,
            sensitivity_uncertainty: 0.05,
            default_bin_minutes: 1.0,
        }
    }
}

impl DoseConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        if !(self.sensitivity > 0.0 && self.sensitivity.is_finite()) {
            return Err(invalid(format!(
                "dose.sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        require_non_negative("dose.sensitivity_uncertainty", self.sensitivity_uncertainty)?;
        if self.default_bin_minutes <= 0.0 {
            return Err(invalid("dose.default_bin_minutes must be positive"));
        }
        Ok(())
    }
}

/// Phase-response curve weights and time-of-day scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Signed weight per local hour (positive = advance, negative = delay)
    pub weights: [f64; 24],
    pub morning_start_hour: u32,
    pub morning_end_hour: u32,
    pub morning_factor: f64,
    /// Evening window may wrap past midnight
    pub evening_start_hour: u32,
    pub evening_end_hour: u32,
    pub evening_factor: f64,
    /// Reduction applied outside both windows
    pub midday_factor: f64,
    /// Shifts below this magnitude are reported as negligible (minutes)
    pub negligible_minutes: f64,
}

/// Delay peaks near 02:00, crosses zero between 06:00 and 07:00, advance
/// peaks at 08:00 and fades by early afternoon.
pub const DEFAULT_PRC_WEIGHTS: [f64; 24] = [
    -0.70, -0.85, -1.00, -0.90, -0.70, -0.40, -0.10, 0.40, //
    1.00, 0.80, 0.55, 0.30, 0.15, 0.05, 0.00, 0.00, //
    -0.05, -0.10, -0.20, -0.30, -0.40, -0.50, -0.60, -0.65,
];

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            weights: DEFAULT_PRC_WEIGHTS,
            morning_start_hour: 5,
            morning_end_hour: 12,
            morning_factor: 1.0,
            evening_start_hour: 17,
            evening_end_hour: 5,
            evening_factor: 0.9,
            midday_factor: 0.5,
            negligible_minutes: 6.0,
        }
    }
}

impl PhaseConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        if self.weights.iter().any(|w| !w.is_finite()) {
            return Err(invalid("phase weights must be finite"));
        }
        require_hour("phase.morning_start_hour", self.morning_start_hour)?;
        require_hour("phase.morning_end_hour", self.morning_end_hour)?;
        require_hour("phase.evening_start_hour", self.evening_start_hour)?;
        require_hour("phase.evening_end_hour", self.evening_end_hour)?;
        require_non_negative("phase.morning_factor", self.morning_factor)?;
        require_non_negative("phase.evening_factor", self.evening_factor)?;
        require_non_negative("phase.midday_factor", self.midday_factor)?;
        require_non_negative("phase.negligible_minutes", self.negligible_minutes)
    }
}

/// Light-source classification policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Results at or below this confidence fall through to the next classifier
    pub min_confidence: f64,
    /// Try the camera before the heuristic
    pub prefer_camera: bool,
    /// Brightness above which the screen can dominate
    pub screen_brightness_threshold: f64,
    /// Screen share of current illuminance required for a screen label
    pub screen_dominance_fraction: f64,
    pub screen_confidence: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            prefer_camera: true,
            screen_brightness_threshold: 0.3,
            screen_dominance_fraction: 0.7,
            screen_confidence: 0.7,
        }
    }
}

impl ClassificationConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        require_fraction("classification.min_confidence", self.min_confidence)?;
        require_fraction(
            "classification.screen_brightness_threshold",
            self.screen_brightness_threshold,
        )?;
        require_non_negative(
            "classification.screen_dominance_fraction",
            self.screen_dominance_fraction,
        )?;
        require_fraction("classification.screen_confidence", self.screen_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(LumenConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = LumenConfig::from_json(
            r#"{"dose": {"sensitivity": 0.3}, "stimulus": {"steepness": 0.004}}"#,
        )
        .unwrap();

        assert_eq!(config.dose.sensitivity, 0.3);
        assert_eq!(config.stimulus.steepness, 0.004);
        assert_eq!(config.stimulus.ceiling, 0.7);
        assert_eq!(config.conditioner, ConditionerConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LumenConfig::default();
        let json = config.to_json().unwrap();
        let loaded = LumenConfig::from_json(&json).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_ratio_lookup_and_fallback() {
        let ratios = MelanopicRatios::default();
        assert_eq!(ratios.ratio_for(LightType::Neutral), 0.60);
        assert_eq!(ratios.ratio_for(LightType::Cool), 0.85);
        assert_eq!(ratios.ratio_for(LightType::Unknown), ratios.default_ratio);

        let mut sparse = MelanopicRatios::default();
        sparse.ratios.remove(&LightType::Screen);
        sparse.default_ratio = 0.5;
        assert_eq!(sparse.ratio_for(LightType::Screen), 0.5);
    }

    #[test]
    fn test_brightness_interpolation() {
        let table = BrightnessTable::default();
        assert_eq!(table.lookup(0.5), 40.0);
        assert_eq!(table.lookup(0.0), 0.0);
        assert!((table.lookup(0.375) - 26.0).abs() < 1e-9);
        assert_eq!(table.lookup(1.5), 130.0);
        assert_eq!(table.lookup(-0.2), 0.0);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = LumenConfig::default();
        config.conditioner.smoothing_alpha = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ComputeError::InvalidConfig(_))
        ));

        let mut config = LumenConfig::default();
        config.stimulus.brightness_table.anchors.swap(1, 2);
        assert!(config.validate().is_err());

        let mut config = LumenConfig::default();
        config.conditioner.max_lux = -1.0;
        assert!(config.validate().is_err());

        let mut config = LumenConfig::default();
        config.phase.evening_start_hour = 24;
        assert!(config.validate().is_err());
    }
}
