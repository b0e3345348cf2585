//! sRGB decoding and tristimulus conversion

use crate::colorimetry::chromaticity::{Chromaticity, D65_WHITE};
use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Below this encoded value the sRGB transfer curve is linear
const SRGB_LINEAR_THRESHOLD: f64 = 0.04045;

/// Linear sRGB (D65) to CIE XYZ, IEC 61966-2-1
const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412_456_4, 0.357_576_1, 0.180_437_5],
    [0.212_672_9, 0.715_152_2, 0.072_175_0],
    [0.019_333_9, 0.119_192_0, 0.950_304_1],
];

/// Gamma-encoded sRGB color with channels in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// CIE 1931 tristimulus values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RgbColor {
    /// Construct a validated color
    pub fn new(r: f64, g: f64, b: f64) -> Result<Self, ComputeError> {
        let color = Self { r, g, b };
        color.validate()?;
        Ok(color)
    }

    /// Construct from 8-bit channel values
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f64::from(r) / 255.0,
            g: f64::from(g) / 255.0,
            b: f64::from(b) / 255.0,
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        for (name, value) in [("r", self.r), ("g", self.g), ("b", self.b)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ComputeError::InvalidColorSample(format!(
                    "channel {name} = {value} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Decode to linear-light RGB
    pub fn to_linear(&self) -> [f64; 3] {
        [
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
        ]
    }

    pub fn to_xyz(&self) -> Xyz {
        let linear = self.to_linear();
        let row = |m: [f64; 3]| m[0] * linear[0] + m[1] * linear[1] + m[2] * linear[2];
        Xyz {
            x: row(SRGB_TO_XYZ[0]),
            y: row(SRGB_TO_XYZ[1]),
            z: row(SRGB_TO_XYZ[2]),
        }
    }
}

/// Inverse sRGB transfer function for one channel
pub fn srgb_to_linear(encoded: f64) -> f64 {
    if encoded <= SRGB_LINEAR_THRESHOLD {
        encoded / 12.92
    } else {
        ((encoded + 0.055) / 1.055).powf(2.4)
    }
}

impl Xyz {
    /// Project to xy chromaticity; black or non-finite input maps to D65
    pub fn chromaticity(&self) -> Chromaticity {
        let sum = self.x + self.y + self.z;
        if !sum.is_finite() || sum <= 0.0 {
            return D65_WHITE;
        }
        Chromaticity {
            x: self.x / sum,
            y: self.y / sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_transfer_curve_pieces() {
        assert_abs_diff_eq!(srgb_to_linear(0.04), 0.04 / 12.92, epsilon = 1e-12);
        assert_abs_diff_eq!(srgb_to_linear(1.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(srgb_to_linear(0.5), 0.214_041, epsilon = 1e-6);
        assert_eq!(srgb_to_linear(0.0), 0.0);
    }

    #[test]
    fn test_white_maps_to_d65() {
        let white = RgbColor::new(1.0, 1.0, 1.0).unwrap();
        let xyz = white.to_xyz();
        assert_abs_diff_eq!(xyz.y, 1.0, epsilon = 1e-6);

        let xy = xyz.chromaticity();
        assert_abs_diff_eq!(xy.x, 0.3127, epsilon = 1e-3);
        assert_abs_diff_eq!(xy.y, 0.3290, epsilon = 1e-3);
    }

    #[test]
    fn test_black_falls_back_to_d65() {
        let black = RgbColor::new(0.0, 0.0, 0.0).unwrap();
        assert_eq!(black.to_xyz().chromaticity(), D65_WHITE);
    }

    #[test]
    fn test_pure_red_primary() {
        let xy = RgbColor::new(1.0, 0.0, 0.0).unwrap().to_xyz().chromaticity();
        assert_abs_diff_eq!(xy.x, 0.64, epsilon = 1e-3);
        assert_abs_diff_eq!(xy.y, 0.33, epsilon = 1e-3);
    }

    #[test]
    fn test_rejects_out_of_domain_channels() {
        assert!(matches!(
            RgbColor::new(1.2, 0.5, 0.5),
            Err(ComputeError::InvalidColorSample(_))
        ));
        assert!(RgbColor::new(0.5, -0.1, 0.5).is_err());
        assert!(RgbColor::new(0.5, 0.5, f64::NAN).is_err());
    }

    #[test]
    fn test_from_u8() {
        let c = RgbColor::from_u8(255, 0, 51);
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 0.0);
        assert_abs_diff_eq!(c.b, 0.2, epsilon = 1e-12);
    }
}
