use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

/// How long samples stay relevant for trend estimation.
pub const RETENTION_MINUTES: u64 = 30;

/// Hard cap on retained samples so a ping storm cannot grow the window
/// unbounded inside the retention period.
pub const MAX_SAMPLES: usize = 512;

/// One recorded ping. Immutable once stored.
#[derive(Debug, Clone)]
pub struct LocationSample {
    pub timestamp: SystemTime,
    pub latitude: f64,
    pub longitude: f64,
    /// Great-circle distance from the configured home, in miles.
    pub distance_from_home: f64,
    pub speed_mph: f64,
}

/// Append-only, time-bounded sequence of location samples, ordered by
/// arrival. Callers evict before reading so trend estimation never sees
/// samples older than the retention window.
#[derive(Debug)]
pub struct LocationHistory {
    samples: VecDeque<LocationSample>,
    retention: Duration,
    max_samples: usize,
}

impl LocationHistory {
    pub fn new() -> Self {
        Self::with_limits(Duration::from_secs(RETENTION_MINUTES * 60), MAX_SAMPLES)
    }

    pub fn with_limits(retention: Duration, max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
            max_samples,
        }
    }

    /// Appends a sample to the tail, dropping the oldest one at the cap.
    ///
    /// Timestamps are not validated; an out-of-order timestamp degrades
    /// trend quality, nothing more.
    pub fn record(&mut self, sample: LocationSample) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Drops head samples older than the retention window relative to `now`.
    pub fn evict(&mut self, now: SystemTime) {
        let Some(cutoff) = now.checked_sub(self.retention) else {
            return;
        };
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Up to the last `n` samples in arrival order, fewer if the history
    /// is shorter.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &LocationSample> {
        self.samples
            .iter()
            .skip(self.samples.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for LocationHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn sample_at(secs: u64, distance: f64) -> LocationSample {
        LocationSample {
            timestamp: UNIX_EPOCH + Duration::from_secs(secs),
            latitude: 0.0,
            longitude: 0.0,
            distance_from_home: distance,
            speed_mph: 0.0,
        }
    }

    #[test]
    fn evicts_only_past_the_retention_window() {
        let mut history = LocationHistory::new();
        let inserted_at = 1_000;
        history.record(sample_at(inserted_at, 1.0));

        let window = RETENTION_MINUTES * 60;
        history.evict(UNIX_EPOCH + Duration::from_secs(inserted_at + window - 1));
        assert_eq!(history.len(), 1);

        history.evict(UNIX_EPOCH + Duration::from_secs(inserted_at + window + 1));
        assert!(history.is_empty());
    }

    #[test]
    fn a_fresh_sample_survives_its_own_ping() {
        // Eviction runs before append, so even a sample stamped far in the
        // past (skewed device clock) is retained for the ping that carried it.
        let mut history = LocationHistory::new();
        history.evict(UNIX_EPOCH + Duration::from_secs(RETENTION_MINUTES * 60 * 10));
        history.record(sample_at(0, 1.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn cap_drops_the_oldest_sample() {
        let mut history = LocationHistory::with_limits(Duration::from_secs(3600), 3);
        for i in 0..4 {
            history.record(sample_at(i, i as f64));
        }
        assert_eq!(history.len(), 3);
        let oldest = history.tail(3).next().unwrap();
        assert_eq!(oldest.distance_from_home, 1.0);
    }

    #[test]
    fn tail_returns_fewer_when_short() {
        let mut history = LocationHistory::new();
        history.record(sample_at(0, 0.5));
        assert_eq!(history.tail(5).count(), 1);
    }

    #[test]
    fn tail_is_in_arrival_order() {
        let mut history = LocationHistory::new();
        for i in 0..5 {
            history.record(sample_at(i, i as f64));
        }
        let distances: Vec<f64> = history.tail(3).map(|s| s.distance_from_home).collect();
        assert_eq!(distances, vec![2.0, 3.0, 4.0]);
    }
}
