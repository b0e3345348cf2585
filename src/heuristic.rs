//! Context heuristic light-source classifier
//!
//! Used when no usable camera sample exists. A bright screen that dominates
//! the measured illuminance is labelled as screen light; otherwise a fixed
//! table keyed on time-of-day band and illuminance band picks the category.

use crate::arbiter::{ClassificationContext, LightClassifier};
use crate::config::{ClassificationConfig, StimulusConfig};
use crate::error::ComputeError;
use crate::stimulus::StimulusEngine;
use crate::types::{ClassificationResult, LightType};
use chrono::Timelike;

/// Time-of-day band used by the lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBand {
    /// 17:00 to 05:00
    NightEvening,
    /// 05:00 to 10:00
    Morning,
    /// 10:00 to 17:00
    Daytime,
}

impl DayBand {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=9 => DayBand::Morning,
            10..=16 => DayBand::Daytime,
            _ => DayBand::NightEvening,
        }
    }
}

pub struct HeuristicClassifier {
    engine: StimulusEngine,
    config: ClassificationConfig,
}

impl HeuristicClassifier {
    pub fn new(stimulus: StimulusConfig, config: ClassificationConfig) -> Self {
        Self {
            engine: StimulusEngine::new(stimulus, 1.0),
            config,
        }
    }

    /// Whether the screen accounts for most of the light reaching the eye
    pub fn screen_dominant(&self, ctx: &ClassificationContext) -> bool {
        if !ctx.screen_on {
            return false;
        }
        let brightness = match ctx.screen_brightness {
            Some(b) if b.is_finite() && b > self.config.screen_brightness_threshold => b,
            _ => return false,
        };
        let screen_lux = self.engine.screen_lux(brightness, ctx.pitch_rad);
        screen_lux > self.config.screen_dominance_fraction * ctx.current_illuminance()
    }

    pub fn classify_context(&self, ctx: &ClassificationContext) -> ClassificationResult {
        if self.screen_dominant(ctx) {
            return ClassificationResult::heuristic(LightType::Screen, self.config.screen_confidence);
        }
        let (light_type, confidence) =
            band_lookup(DayBand::from_hour(ctx.timestamp.hour()), ctx.current_illuminance());
        ClassificationResult::heuristic(light_type, confidence)
    }
}

/// Category and confidence for a time band and illuminance
pub fn band_lookup(band: DayBand, lux: f64) -> (LightType, f64) {
    match band {
        DayBand::NightEvening if lux < 200.0 => (LightType::Warm, 0.65),
        DayBand::NightEvening => (LightType::Neutral, 0.55),
        DayBand::Morning if lux >= 1000.0 => (LightType::Daylight, 0.75),
        DayBand::Morning if lux >= 200.0 => (LightType::Cool, 0.6),
        DayBand::Morning => (LightType::Neutral, 0.55),
        DayBand::Daytime if lux >= 1000.0 => (LightType::Daylight, 0.8),
        DayBand::Daytime if lux >= 300.0 => (LightType::Cool, 0.65),
        DayBand::Daytime => (LightType::Neutral, 0.6),
    }
}

impl LightClassifier for HeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn classify(&self, ctx: &ClassificationContext) -> Result<ClassificationResult, ComputeError> {
        Ok(self.classify_context(ctx))
    }
}
