//! Synheart Lumen - On-device compute engine for circadian light exposure metrics
//!
//! Lumen turns a recorded series of ambient-light, motion and screen samples into
//! circadian-health metrics through a deterministic pipeline: signal conditioning
//! → sleep gating → melanopic illuminance and circadian stimulus → dose and
//! melatonin suppression → phase shift.
//!
//! ## Modules
//!
//! - **Exposure Pipeline**: Condition samples and compute stimulus, dose, suppression and phase shift
//! - **Classification**: Label the dominant light source from a camera color sample,
//!   falling back to a time-of-day and illuminance heuristic

pub mod arbiter;
pub mod colorimetry;
pub mod conditioner;
pub mod config;
pub mod dose;
pub mod error;
pub mod export;
pub mod heuristic;
pub mod phase;
pub mod pipeline;
pub mod sleep;
pub mod stimulus;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use arbiter::{ClassificationArbiter, ClassificationContext, LightClassifier};
pub use config::LumenConfig;
pub use error::ComputeError;
pub use pipeline::{process_samples, LumenProcessor, RecordingSession};
pub use types::{ClassificationResult, LightType, ProcessingResult, Sample};

// Colorimetry exports
pub use colorimetry::{CameraClassifier, Chromaticity, RgbColor};

/// Lumen version embedded in exported reports
pub const LUMEN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported reports
pub const PRODUCER_NAME: &str = "synheart-lumen";
