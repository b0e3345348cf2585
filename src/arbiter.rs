//! Light-source classification strategies and the arbiter that chooses between them
//!
//! Each strategy implements [`LightClassifier`] over a shared
//! [`ClassificationContext`]. The arbiter runs them in priority order and keeps
//! the first result whose confidence clears the configured threshold.

use crate::colorimetry::{CameraClassifier, RgbColor};
use crate::config::{ClassificationConfig, StimulusConfig};
use crate::error::ComputeError;
use crate::heuristic::HeuristicClassifier;
use crate::types::ClassificationResult;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Everything a classifier may look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationContext {
    pub timestamp: DateTime<FixedOffset>,
    /// Current ambient illuminance (lux)
    pub illuminance: f64,
    #[serde(default)]
    pub screen_on: bool,
    #[serde(default)]
    pub screen_brightness: Option<f64>,
    #[serde(default)]
    pub pitch_rad: Option<f64>,
    /// Recent ambient readings; their mean replaces `illuminance` when present
    #[serde(default)]
    pub recent_illuminance: Vec<f64>,
    /// Camera color sample, absent when capture failed or was not attempted
    #[serde(default)]
    pub rgb: Option<RgbColor>,
}

impl ClassificationContext {
    pub fn new(timestamp: DateTime<FixedOffset>, illuminance: f64) -> Self {
        Self {
            timestamp,
            illuminance,
            screen_on: false,
            screen_brightness: None,
            pitch_rad: None,
            recent_illuminance: Vec::new(),
            rgb: None,
        }
    }

    pub fn with_screen(mut self, brightness: f64) -> Self {
        self.screen_on = true;
        self.screen_brightness = Some(brightness);
        self
    }

    pub fn with_rgb(mut self, rgb: RgbColor) -> Self {
        self.rgb = Some(rgb);
        self
    }

    pub fn with_recent(mut self, recent: Vec<f64>) -> Self {
        self.recent_illuminance = recent;
        self
    }

    /// Mean of the finite recent readings, else the current reading
    pub fn current_illuminance(&self) -> f64 {
        let finite: Vec<f64> = self
            .recent_illuminance
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if finite.is_empty() {
            self.illuminance
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        }
    }
}

/// A light-source classification strategy
pub trait LightClassifier {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    fn classify(&self, ctx: &ClassificationContext) -> Result<ClassificationResult, ComputeError>;
}

/// Runs classifiers in order and picks the first confident result
pub struct ClassificationArbiter {
    classifiers: Vec<Box<dyn LightClassifier>>,
    min_confidence: f64,
}

impl ClassificationArbiter {
    /// Camera and heuristic strategies ordered by `prefer_camera`
    pub fn new(config: &ClassificationConfig, stimulus: &StimulusConfig) -> Self {
        let camera: Box<dyn LightClassifier> = Box::new(CameraClassifier::new());
        let heuristic: Box<dyn LightClassifier> =
            Box::new(HeuristicClassifier::new(stimulus.clone(), config.clone()));
        let classifiers = if config.prefer_camera {
            vec![camera, heuristic]
        } else {
            vec![heuristic, camera]
        };
        Self::with_classifiers(classifiers, config.min_confidence)
    }

    pub fn with_classifiers(
        classifiers: Vec<Box<dyn LightClassifier>>,
        min_confidence: f64,
    ) -> Self {
        Self {
            classifiers,
            min_confidence,
        }
    }

    pub fn classifier_names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    /// Classify a context
    ///
    /// A result with confidence strictly above the threshold is returned
    /// immediately. Otherwise the last successful result is used, and only
    /// when every strategy fails is the error surfaced.
    pub fn classify(&self, ctx: &ClassificationContext) -> Result<ClassificationResult, ComputeError> {
        let mut fallback: Option<ClassificationResult> = None;
        let mut last_error: Option<ComputeError> = None;

        for classifier in &self.classifiers {
            match classifier.classify(ctx) {
                Ok(result) if result.confidence > self.min_confidence => {
                    tracing::debug!(
                        classifier = classifier.name(),
                        light_type = %result.light_type,
                        confidence = result.confidence,
                        "classification accepted"
                    );
                    return Ok(result);
                }
                Ok(result) => {
                    tracing::debug!(
                        classifier = classifier.name(),
                        confidence = result.confidence,
                        "classification below threshold, trying next"
                    );
                    fallback = Some(result);
                }
                Err(err) => {
                    if err.is_classification_fallback() {
                        tracing::debug!(
                            classifier = classifier.name(),
                            error = %err,
                            "classifier unavailable"
                        );
                    } else {
                        tracing::warn!(classifier = classifier.name(), error = %err, "classifier failed");
                    }
                    last_error = Some(err);
                }
            }
        }

        fallback.ok_or_else(|| {
            last_error.unwrap_or_else(|| {
                ComputeError::ClassificationUnavailable("no classifiers configured".to_string())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassificationMethod, LightType};
    use pretty_assertions::assert_eq;

    struct Fixed(f64);

    impl LightClassifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn classify(&self, _: &ClassificationContext) -> Result<ClassificationResult, ComputeError> {
            Ok(ClassificationResult::heuristic(LightType::Cool, self.0))
        }
    }

    struct Failing;

    impl LightClassifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn classify(&self, _: &ClassificationContext) -> Result<ClassificationResult, ComputeError> {
            Err(ComputeError::ClassificationUnavailable("denied".to_string()))
        }
    }

    fn noon(lux: f64) -> ClassificationContext {
        let ts = DateTime::parse_from_rfc3339("2024-01-15T12:00:00+00:00").unwrap();
        ClassificationContext::new(ts, lux)
    }

    fn arbiter() -> ClassificationArbiter {
        ClassificationArbiter::new(&ClassificationConfig::default(), &StimulusConfig::default())
    }

    #[test]
    fn test_confident_camera_wins() {
        let ctx = noon(50.0).with_rgb(RgbColor::new(1.0, 1.0, 1.0).unwrap());
        let result = arbiter().classify(&ctx).unwrap();
        assert_eq!(result.method, ClassificationMethod::Camera);
        assert_eq!(result.light_type, LightType::Daylight);
    }

    #[test]
    fn test_missing_camera_falls_back_to_heuristic() {
        let result = arbiter().classify(&noon(1500.0)).unwrap();
        assert_eq!(result.method, ClassificationMethod::Heuristic);
        assert_eq!(result.light_type, LightType::Daylight);
    }

    #[test]
    fn test_low_confidence_camera_falls_back() {
        // Saturated green is far from D65 and lands in the lowest band
        let ctx = noon(1500.0).with_rgb(RgbColor::new(0.0, 1.0, 0.0).unwrap());
        let result = arbiter().classify(&ctx).unwrap();
        assert_eq!(result.method, ClassificationMethod::Heuristic);
    }

    #[test]
    fn test_out_of_range_rgb_falls_back_to_heuristic() {
        // Deserialization does not validate the color sample
        let ctx: ClassificationContext = serde_json::from_str(
            r#"{
                "timestamp": "2024-01-15T12:00:00+00:00",
                "illuminance": 1500.0,
                "rgb": {"r": 2.0, "g": 0.5, "b": 0.5}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            CameraClassifier::new().classify(&ctx),
            Err(ComputeError::InvalidColorSample(_))
        ));

        let result = arbiter().classify(&ctx).unwrap();
        assert_eq!(result.method, ClassificationMethod::Heuristic);
        assert_eq!(result.light_type, LightType::Daylight);
    }

    #[test]
    fn test_threshold_is_strict() {
        let classifiers: Vec<Box<dyn LightClassifier>> =
            vec![Box::new(Fixed(0.5)), Box::new(Fixed(0.4))];
        let arbiter = ClassificationArbiter::with_classifiers(classifiers, 0.5);
        // Neither clears 0.5, so the last successful result is kept
        let result = arbiter.classify(&noon(10.0)).unwrap();
        assert_eq!(result.confidence, 0.4);
    }

    #[test]
    fn test_all_failing_surfaces_error() {
        let classifiers: Vec<Box<dyn LightClassifier>> = vec![Box::new(Failing)];
        let arbiter = ClassificationArbiter::with_classifiers(classifiers, 0.5);
        assert!(matches!(
            arbiter.classify(&noon(10.0)),
            Err(ComputeError::ClassificationUnavailable(_))
        ));

        let empty = ClassificationArbiter::with_classifiers(Vec::new(), 0.5);
        assert!(empty.classify(&noon(10.0)).is_err());
    }

    #[test]
    fn test_order_follows_preference() {
        assert_eq!(arbiter().classifier_names(), vec!["camera", "heuristic"]);

        let config = ClassificationConfig {
            prefer_camera: false,
            ..ClassificationConfig::default()
        };
        let arbiter = ClassificationArbiter::new(&config, &StimulusConfig::default());
        assert_eq!(arbiter.classifier_names(), vec!["heuristic", "camera"]);
    }

    #[test]
    fn test_current_illuminance_prefers_recent_mean() {
        assert_eq!(noon(80.0).current_illuminance(), 80.0);
        let ctx = noon(80.0).with_recent(vec![100.0, 200.0, f64::NAN]);
        assert_eq!(ctx.current_illuminance(), 150.0);
    }
}
