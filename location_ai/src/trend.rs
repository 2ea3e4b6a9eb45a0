use serde::Serialize;

use crate::history::LocationHistory;

/// Minimum number of recorded samples before a trend can be derived.
pub const MIN_SAMPLES_FOR_TREND: usize = 2;

/// Average distance delta (miles) below which movement counts as
/// stationary. 0.01 miles is roughly 53 feet.
pub const MOVEMENT_THRESHOLD_MILES: f64 = 0.01;

/// Direction of travel relative to home, derived from recent history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Unknown,
    Approaching,
    MovingAway,
    Stationary,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Unknown => "unknown",
            Trend::Approaching => "approaching",
            Trend::MovingAway => "moving_away",
            Trend::Stationary => "stationary",
        }
    }
}

/// Reduces the tail of the history to a trend label.
///
/// Averages the consecutive distance-from-home deltas across the last
/// `MIN_SAMPLES_FOR_TREND` samples. Deterministic, no side effects.
pub fn estimate(history: &LocationHistory) -> Trend {
    if history.len() < MIN_SAMPLES_FOR_TREND {
        return Trend::Unknown;
    }

    let recent: Vec<f64> = history
        .tail(MIN_SAMPLES_FOR_TREND)
        .map(|s| s.distance_from_home)
        .collect();
    let deltas: Vec<f64> = recent.windows(2).map(|w| w[1] - w[0]).collect();
    if deltas.is_empty() {
        return Trend::Unknown;
    }

    let avg = deltas.iter().sum::<f64>() / deltas.len() as f64;
    if avg < -MOVEMENT_THRESHOLD_MILES {
        Trend::Approaching
    } else if avg > MOVEMENT_THRESHOLD_MILES {
        Trend::MovingAway
    } else {
        Trend::Stationary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::LocationSample;
    use std::time::{Duration, UNIX_EPOCH};

    fn history_with(distances: &[f64]) -> LocationHistory {
        let mut history = LocationHistory::new();
        for (i, d) in distances.iter().enumerate() {
            history.record(LocationSample {
                timestamp: UNIX_EPOCH + Duration::from_secs(i as u64),
                latitude: 0.0,
                longitude: 0.0,
                distance_from_home: *d,
                speed_mph: 0.0,
            });
        }
        history
    }

    #[test]
    fn short_history_is_unknown() {
        assert_eq!(estimate(&history_with(&[])), Trend::Unknown);
        assert_eq!(estimate(&history_with(&[3.0])), Trend::Unknown);
    }

    #[test]
    fn closing_distance_is_approaching() {
        assert_eq!(estimate(&history_with(&[3.0, 1.5])), Trend::Approaching);
        assert_eq!(estimate(&history_with(&[1.0, 0.98])), Trend::Approaching);
    }

    #[test]
    fn growing_distance_is_moving_away() {
        assert_eq!(estimate(&history_with(&[1.5, 3.0])), Trend::MovingAway);
        assert_eq!(estimate(&history_with(&[1.0, 1.02])), Trend::MovingAway);
    }

    #[test]
    fn small_drift_is_stationary() {
        assert_eq!(estimate(&history_with(&[1.0, 1.005])), Trend::Stationary);
        assert_eq!(estimate(&history_with(&[1.0, 0.995])), Trend::Stationary);
    }

    #[test]
    fn only_the_last_samples_count() {
        // Samples before the trend window have no effect on the label.
        assert_eq!(estimate(&history_with(&[0.5, 3.0, 1.5])), Trend::Approaching);
    }
}
