//! Colorimetry
//!
//! Converts a camera RGB sample into CIE chromaticity, estimates correlated
//! color temperature, and maps it to a light-source category with a
//! confidence score.
//!
//! Pipeline: sRGB → linear RGB → XYZ → xy → CCT → LightType

pub mod chromaticity;
pub mod classifier;
pub mod rgb;

pub use chromaticity::{Chromaticity, D65_WHITE};
pub use classifier::CameraClassifier;
pub use rgb::{RgbColor, Xyz};
