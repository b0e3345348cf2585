//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Lumen.
//! It runs a buffered session end-to-end, from raw samples to a
//! [`ProcessingResult`].

use crate::arbiter::{ClassificationArbiter, ClassificationContext};
use crate::conditioner::SignalConditioner;
use crate::config::LumenConfig;
use crate::dose::{total_dose, DoseIntegrator};
use crate::error::ComputeError;
use crate::phase::PhaseResponseCurve;
use crate::sleep::{in_any_episode, SleepDetector};
use crate::stimulus::{StimulusEngine, StimulusReading};
use crate::types::{
    ClassificationResult, HourlyExposure, ProcessingResult, Sample, SessionMetadata,
    StimulusSample, SummaryStats,
};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Process a complete session in one pass.
///
/// # Arguments
/// * `samples` - Raw samples ordered by timestamp
/// * `classification` - Light-source label; `None` applies the default melanopic ratio
/// * `config` - Model configuration
///
/// # Returns
/// The processing result, `InvalidConfig` when `config` fails validation, or
/// `EmptySession` when no usable sample remains
///
/// # Example
/// ```ignore
/// let result = process_samples(&samples, Some(ClassificationResult::manual(LightType::Cool)), &config)?;
/// println!("dose {:.3}, suppression {:.1}%", result.total_dose, result.suppression * 100.0);
/// ```
pub fn process_samples(
    samples: &[Sample],
    classification: Option<ClassificationResult>,
    config: &LumenConfig,
) -> Result<ProcessingResult, ComputeError> {
    config.validate()?;
    let mut conditioner = SignalConditioner::new(config.conditioner.clone());
    let mut buffer = ConditionedBuffer::default();
    for sample in samples {
        buffer.push(&mut conditioner, sample)?;
    }
    process_conditioned(buffer, classification, config)
}

/// Conditioned samples plus the anomaly counts gathered while conditioning
#[derive(Debug, Default)]
struct ConditionedBuffer {
    samples: Vec<Sample>,
    skipped: usize,
    clamped: usize,
}

impl ConditionedBuffer {
    /// Condition one sample; sample-level failures are counted and skipped
    fn push(
        &mut self,
        conditioner: &mut SignalConditioner,
        sample: &Sample,
    ) -> Result<(), ComputeError> {
        if let Some(violation) = conditioner.range_violation(sample.ambient_lux) {
            tracing::warn!(timestamp = %sample.timestamp, error = %violation, "clamping reading");
        }
        match conditioner.condition(sample.ambient_lux) {
            Ok(reading) => {
                if reading.clamped {
                    self.clamped += 1;
                }
                let mut conditioned = sample.clone();
                conditioned.ambient_lux = reading.lux;
                self.samples.push(conditioned);
                Ok(())
            }
            Err(err) if err.is_sample_level() => {
                tracing::warn!(timestamp = %sample.timestamp, error = %err, "skipping sample");
                self.skipped += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Stages after conditioning:
/// 1. SleepDetector - find rest episodes
/// 2. StimulusEngine - illuminance, melanopic lux, circadian stimulus
/// 3. DoseIntegrator - per-sample dose, total dose, suppression
/// 4. PhaseResponseCurve - net phase shift
fn process_conditioned(
    buffer: ConditionedBuffer,
    classification: Option<ClassificationResult>,
    config: &LumenConfig,
) -> Result<ProcessingResult, ComputeError> {
    let ConditionedBuffer {
        samples,
        skipped,
        clamped,
    } = buffer;

    if samples.is_empty() {
        return Err(ComputeError::EmptySession);
    }

    let light_type = classification
        .as_ref()
        .map(|c| c.light_type)
        .unwrap_or_default();

    // Stage 1: Sleep gating
    let (episodes, metadata) = if config.sleep.enabled {
        let episodes = SleepDetector::new(config.sleep.clone()).detect(&samples);
        let metadata = SessionMetadata::from_episodes(episodes.clone());
        (episodes, Some(metadata))
    } else {
        (Vec::new(), None)
    };

    // Stage 2: Stimulus per sample
    let engine = StimulusEngine::new(config.stimulus.clone(), config.sleep.attenuation);
    let integrator = DoseIntegrator::new(config.dose.clone());
    let timestamps: Vec<DateTime<FixedOffset>> = samples.iter().map(|s| s.timestamp).collect();
    let bin_hours = integrator.bin_hours(&timestamps);

    let readings: Vec<(bool, StimulusReading)> = samples
        .iter()
        .map(|sample| {
            let in_sleep = in_any_episode(&episodes, &sample.timestamp);
            (in_sleep, engine.evaluate(sample, in_sleep, light_type))
        })
        .collect();

    // Stage 3: Dose and suppression
    let stimulus: Vec<f64> = readings.iter().map(|(_, r)| r.circadian_stimulus).collect();
    let dose_increments = integrator.increments(&stimulus, bin_hours);
    let dose = total_dose(&dose_increments);

    let stimulus_samples: Vec<StimulusSample> = samples
        .iter()
        .zip(&readings)
        .zip(&dose_increments)
        .map(|((sample, (in_sleep, reading)), increment)| StimulusSample {
            timestamp: sample.timestamp,
            illuminance: reading.illuminance,
            melanopic_lux: reading.melanopic_lux,
            circadian_stimulus: reading.circadian_stimulus,
            dose_increment: *increment,
            in_sleep: *in_sleep,
        })
        .collect();

    // Stage 4: Phase shift
    let prc = PhaseResponseCurve::new(config.phase.clone());
    let phase_shift_hours = prc.cumulative(&timestamps, &dose_increments)?;

    let hourly = hourly_breakdown(&prc, &stimulus_samples);
    let summary = summarize(&stimulus_samples, skipped, clamped, bin_hours);

    tracing::info!(
        samples = summary.sample_count,
        skipped,
        light_type = %light_type,
        total_dose = dose,
        phase_shift_hours,
        "session processed"
    );

    Ok(ProcessingResult {
        session_id: Uuid::new_v4().to_string(),
        computed_at_utc: Utc::now(),
        light_type,
        classification,
        total_dose: dose,
        suppression: integrator.suppression(dose),
        suppression_bounds: integrator.suppression_bounds(dose),
        phase_shift_hours,
        phase: prc.interpret(phase_shift_hours),
        timestamps,
        illuminance: stimulus_samples.iter().map(|s| s.illuminance).collect(),
        melanopic_lux: stimulus_samples.iter().map(|s| s.melanopic_lux).collect(),
        stimulus,
        dose_increments,
        hourly,
        summary,
        metadata,
    })
}

/// Dose and phase contribution per local hour of day, in hour order
fn hourly_breakdown(prc: &PhaseResponseCurve, samples: &[StimulusSample]) -> Vec<HourlyExposure> {
    let mut hours: BTreeMap<u32, HourlyExposure> = BTreeMap::new();
    for sample in samples {
        let hour = sample.timestamp.hour();
        let entry = hours.entry(hour).or_insert(HourlyExposure {
            hour,
            samples: 0,
            dose: 0.0,
            phase_shift_hours: 0.0,
        });
        entry.samples += 1;
        entry.dose += sample.dose_increment;
        entry.phase_shift_hours += prc.shift(&sample.timestamp, sample.dose_increment);
    }
    hours.into_values().collect()
}

fn summarize(
    samples: &[StimulusSample],
    skipped: usize,
    clamped: usize,
    bin_hours: f64,
) -> SummaryStats {
    let count = samples.len();
    let stimulus: Vec<f64> = samples.iter().map(|s| s.circadian_stimulus).collect();
    let melanopic: Vec<f64> = samples.iter().map(|s| s.melanopic_lux).collect();

    let duration_hours = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => {
            (last.timestamp - first.timestamp).num_milliseconds() as f64 / 3_600_000.0
        }
        _ => 0.0,
    };

    SummaryStats {
        sample_count: count,
        skipped_samples: skipped,
        clamped_samples: clamped,
        duration_hours,
        bin_hours,
        mean_stimulus: mean(&stimulus),
        peak_stimulus: peak(&stimulus),
        mean_melanopic_lux: mean(&melanopic),
        peak_melanopic_lux: peak(&melanopic),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn peak(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

/// A push-style recording session.
///
/// Owns its signal conditioner exclusively; smoothing state is reset on
/// [`RecordingSession::start`] and never shared between sessions.
pub struct RecordingSession {
    config: LumenConfig,
    conditioner: SignalConditioner,
    buffer: ConditionedBuffer,
    recording: bool,
}

impl RecordingSession {
    pub fn new(config: LumenConfig) -> Self {
        Self {
            conditioner: SignalConditioner::new(config.conditioner.clone()),
            config,
            buffer: ConditionedBuffer::default(),
            recording: false,
        }
    }

    /// Begin recording, discarding any earlier samples
    ///
    /// Fails with `InvalidConfig` before any state changes if the session's
    /// configuration does not validate.
    pub fn start(&mut self) -> Result<(), ComputeError> {
        self.config.validate()?;
        self.conditioner.reset();
        self.buffer = ConditionedBuffer::default();
        self.recording = true;
        tracing::debug!("recording started");
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Number of conditioned samples buffered so far
    pub fn len(&self) -> usize {
        self.buffer.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.samples.is_empty()
    }

    /// Condition and buffer one sample
    pub fn push(&mut self, sample: Sample) -> Result<(), ComputeError> {
        if !self.recording {
            return Err(ComputeError::SessionState(
                "push called before start or after stop".to_string(),
            ));
        }
        self.buffer.push(&mut self.conditioner, &sample)
    }

    pub fn stop(&mut self) {
        self.recording = false;
        tracing::debug!(samples = self.buffer.samples.len(), "recording stopped");
    }

    /// Run the full pipeline over everything recorded
    pub fn finish(
        mut self,
        classification: Option<ClassificationResult>,
    ) -> Result<ProcessingResult, ComputeError> {
        self.stop();
        process_conditioned(self.buffer, classification, &self.config)
    }
}

/// Configured entry point bundling classification and processing.
pub struct LumenProcessor {
    config: LumenConfig,
    arbiter: ClassificationArbiter,
}

impl Default for LumenProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LumenProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::build(LumenConfig::default())
    }

    /// Create a processor from a validated configuration
    pub fn with_config(config: LumenConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Load a processor from a JSON configuration document
    pub fn from_config_json(json: &str) -> Result<Self, ComputeError> {
        Ok(Self::build(LumenConfig::from_json(json)?))
    }

    fn build(config: LumenConfig) -> Self {
        let arbiter = ClassificationArbiter::new(&config.classification, &config.stimulus);
        Self { config, arbiter }
    }

    pub fn config(&self) -> &LumenConfig {
        &self.config
    }

    pub fn classify(&self, ctx: &ClassificationContext) -> Result<ClassificationResult, ComputeError> {
        self.arbiter.classify(ctx)
    }

    /// Classify, degrading to no label when every classifier fails
    pub fn classify_or_default(&self, ctx: &ClassificationContext) -> Option<ClassificationResult> {
        match self.classify(ctx) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(error = %err, "classification failed, using default melanopic ratio");
                None
            }
        }
    }

    pub fn process(
        &self,
        samples: &[Sample],
        classification: Option<ClassificationResult>,
    ) -> Result<ProcessingResult, ComputeError> {
        process_samples(samples, classification, &self.config)
    }

    pub fn session(&self) -> RecordingSession {
        RecordingSession::new(self.config.clone())
    }
}
