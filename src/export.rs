//! Result export
//!
//! CSV table with header `timestamp,lux,melanopic,cs`, one row per sample,
//! and JSON encodings of the full result.

use crate::error::ComputeError;
use crate::types::ProcessingResult;
use crate::{LUMEN_VERSION, PRODUCER_NAME};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const CSV_HEADER: &str = "timestamp,lux,melanopic,cs";

/// Producer metadata attached to exported reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
}

impl Default for Producer {
    fn default() -> Self {
        Self {
            name: PRODUCER_NAME.to_string(),
            version: LUMEN_VERSION.to_string(),
        }
    }
}

/// A processing result wrapped with its producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub producer: Producer,
    pub result: ProcessingResult,
}

/// Render the per-sample table
///
/// `lux` is the effective illuminance at the eye. Timestamps are RFC 3339
/// with millisecond precision and their original offset.
pub fn to_csv(result: &ProcessingResult) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + result.len() * 64);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for i in 0..result.len() {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{}",
            result.timestamps[i].to_rfc3339_opts(SecondsFormat::Millis, true),
            result.illuminance[i],
            result.melanopic_lux[i],
            result.stimulus[i],
        );
    }
    out
}

pub fn to_json(result: &ProcessingResult) -> Result<String, ComputeError> {
    serde_json::to_string(result).map_err(|e| ComputeError::EncodingError(e.to_string()))
}

pub fn to_json_pretty(result: &ProcessingResult) -> Result<String, ComputeError> {
    serde_json::to_string_pretty(result).map_err(|e| ComputeError::EncodingError(e.to_string()))
}

pub fn from_json(json: &str) -> Result<ProcessingResult, ComputeError> {
    serde_json::from_str(json).map_err(|e| ComputeError::ParseError(e.to_string()))
}

/// Pretty JSON report with producer metadata
pub fn to_report_json(result: &ProcessingResult) -> Result<String, ComputeError> {
    let report = Report {
        producer: Producer::default(),
        result: result.clone(),
    };
    serde_json::to_string_pretty(&report).map_err(|e| ComputeError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LumenConfig;
    use crate::pipeline::process_samples;
    use crate::types::{ClassificationResult, LightType, Sample};
    use chrono::{DateTime, Duration};
    use pretty_assertions::assert_eq;

    fn result() -> ProcessingResult {
        let base = DateTime::parse_from_rfc3339("2024-01-15T21:00:00-05:00").unwrap();
        let samples: Vec<Sample> = (0..3)
            .map(|i| Sample::ambient(base + Duration::minutes(i), 100.0))
            .collect();
        process_samples(
            &samples,
            Some(ClassificationResult::manual(LightType::Neutral)),
            &LumenConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&result());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("2024-01-15T21:00:00.000-05:00,100,60,"));
        assert!(lines[3].starts_with("2024-01-15T21:02:00.000-05:00,"));
        assert!(csv.ends_with('\n'));
        assert!(!csv.contains('\r'));
    }

    #[test]
    fn test_csv_timestamps_round_trip() {
        let r = result();
        let csv = to_csv(&r);
        for (line, ts) in csv.lines().skip(1).zip(&r.timestamps) {
            let field = line.split(',').next().unwrap();
            assert_eq!(DateTime::parse_from_rfc3339(field).unwrap(), *ts);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let r = result();
        let decoded = from_json(&to_json(&r).unwrap()).unwrap();
        assert_eq!(decoded.stimulus, r.stimulus);
        assert_eq!(decoded.session_id, r.session_id);
        assert_eq!(decoded.light_type, LightType::Neutral);
    }

    #[test]
    fn test_report_carries_producer() {
        let json = to_report_json(&result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["producer"]["name"], PRODUCER_NAME);
        assert_eq!(value["result"]["light_type"], "neutral");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(from_json("{"), Err(ComputeError::ParseError(_))));
    }
}
