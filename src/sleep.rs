//! Sleep episode detection
//!
//! Run-length detection over conditioned samples. A sample is a rest
//! candidate when the device is still AND the room is dark. An episode opens
//! at the first candidate of a run and closes at the first non-candidate
//! that follows it; runs shorter than the configured minimum are dropped.

use crate::config::SleepConfig;
use crate::types::{Sample, SleepEpisode};
use chrono::{DateTime, FixedOffset};

/// Detector for low-activity, low-light intervals
pub struct SleepDetector {
    config: SleepConfig,
}

impl SleepDetector {
    pub fn new(config: SleepConfig) -> Self {
        Self { config }
    }

    /// Whether a sample satisfies the rest condition
    ///
    /// Samples without a motion reading are never rest candidates.
    pub fn is_rest_candidate(&self, sample: &Sample) -> bool {
        match sample.motion {
            Some(motion) => {
                motion < self.config.movement_threshold
                    && sample.ambient_lux < self.config.lux_threshold
            }
            None => false,
        }
    }

    /// Detect episodes over an ordered sample sequence
    pub fn detect(&self, samples: &[Sample]) -> Vec<SleepEpisode> {
        let mut episodes = Vec::new();
        let mut open: Option<DateTime<FixedOffset>> = None;

        for sample in samples {
            let candidate = self.is_rest_candidate(sample);
            match (open, candidate) {
                (None, true) => open = Some(sample.timestamp),
                (Some(start), false) => {
                    self.record(&mut episodes, start, sample.timestamp);
                    open = None;
                }
                _ => {}
            }
        }

        // A run still open at the end closes at the final sample
        if let (Some(start), Some(last)) = (open, samples.last()) {
            self.record(&mut episodes, start, last.timestamp);
        }

        tracing::debug!(episodes = episodes.len(), "sleep detection complete");
        episodes
    }

    fn record(
        &self,
        episodes: &mut Vec<SleepEpisode>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) {
        let episode = SleepEpisode { start, end };
        if episode.duration_minutes() >= self.config.min_duration_minutes {
            episodes.push(episode);
        }
    }
}

/// Whether a timestamp falls inside any of the episodes
pub fn in_any_episode(episodes: &[SleepEpisode], timestamp: &DateTime<FixedOffset>) -> bool {
    episodes.iter().any(|episode| episode.contains(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-15T23:00:00+00:00").unwrap()
    }

    /// One sample per minute; `rest` marks minutes that are dark and still
    fn minutes(rest: &[bool]) -> Vec<Sample> {
        rest.iter()
            .enumerate()
            .map(|(i, &is_rest)| {
                let ts = base() + Duration::minutes(i as i64);
                if is_rest {
                    Sample::ambient(ts, 1.0).with_motion(0.01)
                } else {
                    Sample::ambient(ts, 150.0).with_motion(0.8)
                }
            })
            .collect()
    }

    fn detector() -> SleepDetector {
        SleepDetector::new(SleepConfig::default())
    }

    #[test]
    fn test_no_rest_run_returns_empty() {
        let samples = minutes(&[false; 90]);
        assert!(detector().detect(&samples).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(detector().detect(&[]).is_empty());
    }

    #[test]
    fn test_run_exactly_at_minimum_is_recorded() {
        // Rest from minute 5, first active sample at minute 25: 20 minutes
        let mut pattern = vec![false; 5];
        pattern.extend(vec![true; 20]);
        pattern.extend(vec![false; 5]);
        let episodes = detector().detect(&minutes(&pattern));

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].start, base() + Duration::minutes(5));
        assert_eq!(episodes[0].end, base() + Duration::minutes(25));
    }

    #[test]
    fn test_run_just_below_minimum_is_dropped() {
        let mut pattern = vec![false; 5];
        pattern.extend(vec![true; 19]);
        pattern.extend(vec![false; 5]);
        assert!(detector().detect(&minutes(&pattern)).is_empty());
    }

    #[test]
    fn test_multiple_runs_are_ordered_and_disjoint() {
        let mut pattern = vec![true; 30];
        pattern.extend(vec![false; 10]);
        pattern.extend(vec![true; 45]);
        pattern.push(false);
        let episodes = detector().detect(&minutes(&pattern));

        assert_eq!(episodes.len(), 2);
        assert!(episodes[0].end <= episodes[1].start);
        assert_eq!(episodes[0].start, base());
    }

    #[test]
    fn test_trailing_run_closes_at_last_sample() {
        let mut pattern = vec![false; 3];
        pattern.extend(vec![true; 40]);
        let samples = minutes(&pattern);
        let episodes = detector().detect(&samples);

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].end, samples.last().unwrap().timestamp);
    }

    #[test]
    fn test_missing_motion_is_not_rest() {
        let samples: Vec<Sample> = (0..60)
            .map(|i| Sample::ambient(base() + Duration::minutes(i), 0.5))
            .collect();
        assert!(detector().detect(&samples).is_empty());
    }

    #[test]
    fn test_dark_but_moving_is_not_rest() {
        let samples: Vec<Sample> = (0..60)
            .map(|i| Sample::ambient(base() + Duration::minutes(i), 0.5).with_motion(0.5))
            .collect();
        assert!(detector().detect(&samples).is_empty());
    }

    #[test]
    fn test_in_any_episode() {
        let episodes = vec![SleepEpisode {
            start: base(),
            end: base() + Duration::minutes(30),
        }];
        assert!(in_any_episode(&episodes, &(base() + Duration::minutes(10))));
        assert!(!in_any_episode(&episodes, &(base() + Duration::minutes(31))));
    }
}
