//! Error types for Synheart Lumen

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid sensor reading: {0}")]
    InvalidReading(f64),

    #[error("Reading {value} outside valid range [{min}, {max}]")]
    OutOfRangeReading { value: f64, min: f64, max: f64 },

    #[error("Session contains no samples to process")]
    EmptySession,

    #[error("Length mismatch: {timestamps} timestamps but {doses} dose values")]
    LengthMismatch { timestamps: usize, doses: usize },

    #[error("Invalid color sample: {0}")]
    InvalidColorSample(String),

    #[error("Classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Session is not recording: {0}")]
    SessionState(String),
}

impl ComputeError {
    /// Whether the error only affects a single sample and processing may continue
    pub fn is_sample_level(&self) -> bool {
        matches!(
            self,
            ComputeError::InvalidReading(_) | ComputeError::OutOfRangeReading { .. }
        )
    }

    /// Whether the error is a classification failure that the heuristic fallback covers
    pub fn is_classification_fallback(&self) -> bool {
        matches!(
            self,
            ComputeError::InvalidColorSample(_) | ComputeError::ClassificationUnavailable(_)
        )
    }
}
