//! Camera-based light-source classification

use crate::arbiter::{ClassificationContext, LightClassifier};
use crate::colorimetry::RgbColor;
use crate::error::ComputeError;
use crate::types::{ClassificationMethod, ClassificationResult, LightType};

/// Kelvin range over which the McCamy fit is trusted
const RELIABLE_KELVIN_MIN: f64 = 2500.0;
const RELIABLE_KELVIN_MAX: f64 = 10_000.0;
const UNRELIABLE_KELVIN_PENALTY: f64 = 0.8;

/// Confidence by D_uv proxy band: (upper bound, confidence)
const DUV_CONFIDENCE_BANDS: [(f64, f64); 4] =
    [(0.005, 0.95), (0.01, 0.85), (0.02, 0.70), (0.05, 0.50)];
const DUV_FLOOR_CONFIDENCE: f64 = 0.30;

/// Classifies a camera RGB sample by color temperature
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraClassifier;

impl CameraClassifier {
    pub fn new() -> Self {
        Self
    }

    /// RGB -> XYZ -> xy -> CCT -> category
    pub fn classify_rgb(&self, rgb: &RgbColor) -> Result<ClassificationResult, ComputeError> {
        rgb.validate()?;
        let chromaticity = rgb.to_xyz().chromaticity();
        chromaticity.validate()?;

        let kelvin = chromaticity.cct();
        let duv = chromaticity.duv_proxy();

        Ok(ClassificationResult {
            light_type: LightType::from_kelvin(kelvin),
            kelvin: Some(kelvin),
            confidence: confidence(duv, kelvin),
            method: ClassificationMethod::Camera,
            chromaticity: Some(chromaticity),
            duv: Some(duv),
        })
    }
}

/// Confidence from white-point deviation, penalized outside the reliable Kelvin range
pub fn confidence(duv: f64, kelvin: f64) -> f64 {
    let base = DUV_CONFIDENCE_BANDS
        .iter()
        .find(|(limit, _)| duv < *limit)
        .map(|(_, c)| *c)
        .unwrap_or(DUV_FLOOR_CONFIDENCE);

    let penalized = if kelvin < RELIABLE_KELVIN_MIN || kelvin > RELIABLE_KELVIN_MAX {
        base * UNRELIABLE_KELVIN_PENALTY
    } else {
        base
    };
    penalized.clamp(0.0, 1.0)
}

impl LightClassifier for CameraClassifier {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn classify(&self, ctx: &ClassificationContext) -> Result<ClassificationResult, ComputeError> {
        match &ctx.rgb {
            Some(rgb) => self.classify_rgb(rgb),
            None => Err(ComputeError::ClassificationUnavailable(
                "no camera sample".to_string(),
            )),
        }
    }
}
