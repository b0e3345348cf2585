//! Core types for the Synheart Lumen pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw samples, detected sleep episodes, per-sample stimulus values,
//! classification results, and the final processing result.

use crate::colorimetry::Chromaticity;
use crate::dose::SuppressionBounds;
use crate::error::ComputeError;
use crate::phase::PhaseInterpretation;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dominant light-source category
///
/// `Unknown` is the explicit fallback case: it resolves to the default
/// melanopic ratio rather than to any particular light source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LightType {
    Warm,
    Neutral,
    Cool,
    Daylight,
    Screen,
    Incandescent,
    #[default]
    Unknown,
}

impl LightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightType::Warm => "warm",
            LightType::Neutral => "neutral",
            LightType::Cool => "cool",
            LightType::Daylight => "daylight",
            LightType::Screen => "screen",
            LightType::Incandescent => "incandescent",
            LightType::Unknown => "unknown",
        }
    }

    /// Map a correlated color temperature to a category
    ///
    /// Breakpoints: <3000K warm, <4500K neutral, <6000K cool, else daylight.
    pub fn from_kelvin(kelvin: f64) -> Self {
        if kelvin < 3000.0 {
            LightType::Warm
        } else if kelvin < 4500.0 {
            LightType::Neutral
        } else if kelvin < 6000.0 {
            LightType::Cool
        } else {
            LightType::Daylight
        }
    }

    pub fn all() -> [LightType; 7] {
        [
            LightType::Warm,
            LightType::Neutral,
            LightType::Cool,
            LightType::Daylight,
            LightType::Screen,
            LightType::Incandescent,
            LightType::Unknown,
        ]
    }
}

impl fmt::Display for LightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightType {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warm" => Ok(LightType::Warm),
            "neutral" => Ok(LightType::Neutral),
            "cool" => Ok(LightType::Cool),
            "daylight" => Ok(LightType::Daylight),
            "screen" => Ok(LightType::Screen),
            "incandescent" => Ok(LightType::Incandescent),
            "unknown" => Ok(LightType::Unknown),
            other => Err(ComputeError::ParseError(format!(
                "unknown light type '{other}'"
            ))),
        }
    }
}

/// A single reading delivered by the acquisition layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Local wall-clock time of the reading
    pub timestamp: DateTime<FixedOffset>,
    /// Ambient illuminance (lux)
    pub ambient_lux: f64,
    /// Motion magnitude (device acceleration minus gravity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<f64>,
    #[serde(default)]
    pub screen_on: bool,
    /// Screen brightness fraction (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_brightness: Option<f64>,
    /// Device pitch angle (radians); pi/2 means the screen faces the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_rad: Option<f64>,
}

impl Sample {
    /// Create an ambient-only sample with the screen off and no motion reading
    pub fn ambient(timestamp: DateTime<FixedOffset>, ambient_lux: f64) -> Self {
        Self {
            timestamp,
            ambient_lux,
            motion: None,
            screen_on: false,
            screen_brightness: None,
            pitch_rad: None,
        }
    }

    pub fn with_motion(mut self, motion: f64) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_screen(mut self, brightness: f64) -> Self {
        self.screen_on = true;
        self.screen_brightness = Some(brightness);
        self
    }

    pub fn with_pitch(mut self, pitch_rad: f64) -> Self {
        self.pitch_rad = Some(pitch_rad);
        self
    }
}

/// Detected low-light, low-movement interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepEpisode {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl SleepEpisode {
    /// Inclusive containment test on both endpoints
    pub fn contains(&self, timestamp: &DateTime<FixedOffset>) -> bool {
        *timestamp >= self.start && *timestamp <= self.end
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 60_000.0
    }
}

/// Per-sample output of the stimulus engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusSample {
    pub timestamp: DateTime<FixedOffset>,
    /// Effective illuminance at the eye after screen and sleep adjustments (lux)
    pub illuminance: f64,
    /// Melanopic equivalent illuminance (lux)
    pub melanopic_lux: f64,
    /// Circadian stimulus (0 to ceiling)
    pub circadian_stimulus: f64,
    /// Stimulus-hours contributed by this sample
    pub dose_increment: f64,
    /// Whether the sample fell inside a detected sleep episode
    pub in_sleep: bool,
}

/// How a light-type classification was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Camera,
    Heuristic,
    Manual,
}

impl ClassificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::Camera => "camera",
            ClassificationMethod::Heuristic => "heuristic",
            ClassificationMethod::Manual => "manual",
        }
    }
}

/// Result of a light-source classification attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub light_type: LightType,
    /// Correlated color temperature, when measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kelvin: Option<f64>,
    /// Confidence (0-1)
    pub confidence: f64,
    pub method: ClassificationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromaticity: Option<Chromaticity>,
    /// Deviation-from-white proxy used for confidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duv: Option<f64>,
}

impl ClassificationResult {
    /// A user-selected label, trusted fully
    pub fn manual(light_type: LightType) -> Self {
        Self {
            light_type,
            kelvin: None,
            confidence: 1.0,
            method: ClassificationMethod::Manual,
            chromaticity: None,
            duv: None,
        }
    }

    pub fn heuristic(light_type: LightType, confidence: f64) -> Self {
        Self {
            light_type,
            kelvin: None,
            confidence: confidence.clamp(0.0, 1.0),
            method: ClassificationMethod::Heuristic,
            chromaticity: None,
            duv: None,
        }
    }
}

/// Dose and phase contribution for one hour of the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyExposure {
    /// Hour of day (0-23, local time)
    pub hour: u32,
    pub samples: usize,
    pub dose: f64,
    pub phase_shift_hours: f64,
}

/// Scalar summaries over a processed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub sample_count: usize,
    /// Non-finite readings dropped by the conditioner
    pub skipped_samples: usize,
    /// Readings clamped into the valid range
    pub clamped_samples: usize,
    pub duration_hours: f64,
    /// Time represented by each sample (hours)
    pub bin_hours: f64,
    pub mean_stimulus: f64,
    pub peak_stimulus: f64,
    pub mean_melanopic_lux: f64,
    pub peak_melanopic_lux: f64,
}

/// Sleep-detection metadata attached to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub sleep_episode_count: usize,
    pub sleep_minutes: f64,
    pub episodes: Vec<SleepEpisode>,
}

impl SessionMetadata {
    pub fn from_episodes(episodes: Vec<SleepEpisode>) -> Self {
        let sleep_minutes = episodes.iter().map(SleepEpisode::duration_minutes).sum();
        Self {
            sleep_episode_count: episodes.len(),
            sleep_minutes,
            episodes,
        }
    }
}

/// Complete output of one recording session
///
/// The per-sample arrays (`timestamps`, `illuminance`, `melanopic_lux`,
/// `stimulus`, `dose_increments`) always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub session_id: String,
    pub computed_at_utc: DateTime<Utc>,
    pub light_type: LightType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    /// Stimulus-hours accumulated over the session
    pub total_dose: f64,
    /// Predicted melatonin suppression fraction (0-1)
    pub suppression: f64,
    pub suppression_bounds: SuppressionBounds,
    /// Net phase shift (hours, positive = advance)
    pub phase_shift_hours: f64,
    pub phase: PhaseInterpretation,
    pub timestamps: Vec<DateTime<FixedOffset>>,
    pub illuminance: Vec<f64>,
    pub melanopic_lux: Vec<f64>,
    pub stimulus: Vec<f64>,
    pub dose_increments: Vec<f64>,
    pub hourly: Vec<HourlyExposure>,
    pub summary: SummaryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
}

impl ProcessingResult {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
