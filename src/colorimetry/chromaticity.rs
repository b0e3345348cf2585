//! Chromaticity, correlated color temperature, and white-point deviation

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// CIE 1931 2° chromaticity of illuminant D65
pub const D65_WHITE: Chromaticity = Chromaticity {
    x: 0.3127,
    y: 0.3290,
};

/// McCamy epicenter
const EPICENTER_X: f64 = 0.3320;
const EPICENTER_Y: f64 = 0.1858;

pub const MIN_CCT_K: f64 = 2000.0;
pub const MAX_CCT_K: f64 = 20_000.0;
/// Returned when the CCT fit has no usable denominator
pub const NEUTRAL_CCT_K: f64 = 4000.0;

/// Scale applied to the xy distance from D65 to form the D_uv proxy
const DUV_PROXY_SCALE: f64 = 0.1;

/// xy chromaticity coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

impl Chromaticity {
    pub fn z(&self) -> f64 {
        1.0 - self.x - self.y
    }

    /// Coordinates must lie in the unit square with `x + y <= 1`
    pub fn validate(&self) -> Result<(), ComputeError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.x) || !in_unit(self.y) || self.x + self.y > 1.0 {
            return Err(ComputeError::InvalidColorSample(format!(
                "chromaticity ({:.4}, {:.4}) outside the valid domain",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Correlated color temperature by McCamy's cubic, clamped to `[2000, 20000]` K
    ///
    /// Uses `n = (x - xe) / (y - ye)`. A vanishing denominator or a
    /// non-finite fit yields 4000 K.
    pub fn cct(&self) -> f64 {
        let denominator = self.y - EPICENTER_Y;
        if denominator.abs() < f64::EPSILON {
            return NEUTRAL_CCT_K;
        }
        let n = (self.x - EPICENTER_X) / denominator;
        let kelvin = -449.0 * n.powi(3) + 3525.0 * n.powi(2) - 6823.3 * n + 5520.33;
        if !kelvin.is_finite() {
            return NEUTRAL_CCT_K;
        }
        kelvin.clamp(MIN_CCT_K, MAX_CCT_K)
    }

    /// Deviation proxy: scaled Euclidean distance from the D65 white point
    ///
    /// This stands in for distance from the Planckian locus; warm sources
    /// therefore read as less certain than daylight-like ones.
    pub fn duv_proxy(&self) -> f64 {
        let dx = self.x - D65_WHITE.x;
        let dy = self.y - D65_WHITE.y;
        (dx * dx + dy * dy).sqrt() * DUV_PROXY_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_d65_is_about_6500k() {
        assert_abs_diff_eq!(D65_WHITE.cct(), 6505.0, epsilon = 1.0);
        assert_abs_diff_eq!(D65_WHITE.duv_proxy(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_illuminant_a_is_warm() {
        // CIE illuminant A, 2856 K
        let a = Chromaticity {
            x: 0.44757,
            y: 0.40745,
        };
        assert_abs_diff_eq!(a.cct(), 2856.0, epsilon = 15.0);
    }

    #[test]
    fn test_degenerate_denominator_is_neutral() {
        let c = Chromaticity {
            x: 0.4,
            y: EPICENTER_Y,
        };
        assert_eq!(c.cct(), NEUTRAL_CCT_K);
    }

    #[test]
    fn test_extremes_are_clamped() {
        let bluish = Chromaticity { x: 0.25, y: 0.25 };
        assert_eq!(bluish.cct(), MAX_CCT_K);
        // Far below the locus the cubic undershoots
        let violet = Chromaticity { x: 0.15, y: 0.06 };
        assert_eq!(violet.cct(), MIN_CCT_K);
    }

    #[test]
    fn test_validate_domain() {
        assert!(D65_WHITE.validate().is_ok());
        assert!(Chromaticity { x: 0.7, y: 0.4 }.validate().is_err());
        assert!(Chromaticity { x: -0.1, y: 0.4 }.validate().is_err());
        assert!(Chromaticity { x: f64::NAN, y: 0.4 }.validate().is_err());
    }

    #[test]
    fn test_z_complement() {
        assert_abs_diff_eq!(D65_WHITE.z(), 0.3583, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_cct_always_clamped(x in 0.0..1.0f64, y in 0.0..1.0f64) {
            let cct = Chromaticity { x, y }.cct();
            prop_assert!((MIN_CCT_K..=MAX_CCT_K).contains(&cct));
        }
    }
}
