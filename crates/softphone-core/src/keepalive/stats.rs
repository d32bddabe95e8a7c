//! Probe/pong latency aggregation

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of histogram buckets; the last one collects everything at or above the pong timeout
pub const HISTOGRAM_BUCKETS: usize = 5;

/// One aggregated statistics cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyReport {
    /// Fastest pong of the cycle
    pub min: Duration,
    /// Slowest pong of the cycle
    pub max: Duration,
    /// Number of pongs in the cycle
    pub samples: u32,
    /// Per-bucket counts, when the histogram is enabled
    pub histogram: Option<Vec<u32>>,
    /// Width of each histogram bucket
    pub bucket_width: Option<Duration>,
}

/// Running latency aggregation for one transport
///
/// Every `target_samples` recorded latencies produce one [`LatencyReport`],
/// after which all counters, including min and max, start over.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    target_samples: u32,
    bucket_width: Option<Duration>,
    min: Option<Duration>,
    max: Duration,
    samples: u32,
    histogram: Vec<u32>,
}

impl LatencyStats {
    /// Create an aggregator
    ///
    /// The histogram is only kept when requested and a pong timeout is set,
    /// since its buckets are a quarter of that timeout wide.
    pub fn new(target_samples: u32, pong_timeout: Duration, with_histogram: bool) -> Self {
        let bucket_width = (with_histogram && !pong_timeout.is_zero()).then(|| pong_timeout / 4);
        let buckets = if bucket_width.is_some() { HISTOGRAM_BUCKETS } else { 0 };
        Self {
            target_samples: target_samples.max(1),
            bucket_width,
            min: None,
            max: Duration::ZERO,
            samples: 0,
            histogram: vec![0; buckets],
        }
    }

    /// Record one latency; returns a report when the cycle is complete
    pub fn record(&mut self, latency: Duration) -> Option<LatencyReport> {
        self.min = Some(self.min.map_or(latency, |min| min.min(latency)));
        self.max = self.max.max(latency);
        self.samples += 1;

        if let Some(width) = self.bucket_width {
            let index = if width.is_zero() {
                HISTOGRAM_BUCKETS - 1
            } else {
                ((latency.as_nanos() / width.as_nanos()) as usize).min(HISTOGRAM_BUCKETS - 1)
            };
            self.histogram[index] += 1;
        }

        if self.samples < self.target_samples {
            return None;
        }

        let report = LatencyReport {
            min: self.min.unwrap_or(latency),
            max: self.max,
            samples: self.samples,
            histogram: self.bucket_width.map(|_| self.histogram.clone()),
            bucket_width: self.bucket_width,
        };
        self.reset();
        Some(report)
    }

    /// Samples recorded in the current cycle
    pub fn samples(&self) -> u32 {
        self.samples
    }

    fn reset(&mut self) {
        self.min = None;
        self.max = Duration::ZERO;
        self.samples = 0;
        self.histogram.iter_mut().for_each(|bucket| *bucket = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_report_after_target_samples() {
        let mut stats = LatencyStats::new(3, ms(400), false);
        assert!(stats.record(ms(50)).is_none());
        assert!(stats.record(ms(20)).is_none());
        let report = stats.record(ms(80)).unwrap();
        assert_eq!(report.min, ms(20));
        assert_eq!(report.max, ms(80));
        assert_eq!(report.samples, 3);
        assert!(report.histogram.is_none());
        assert_eq!(stats.samples(), 0);
    }

    #[test]
    fn test_min_max_reset_each_cycle() {
        let mut stats = LatencyStats::new(2, ms(400), false);
        stats.record(ms(5));
        stats.record(ms(300));
        stats.record(ms(100));
        let report = stats.record(ms(120)).unwrap();
        assert_eq!(report.min, ms(100));
        assert_eq!(report.max, ms(120));
    }

    #[test]
    fn test_histogram_buckets_are_quarter_timeout() {
        let mut stats = LatencyStats::new(5, ms(400), true);
        stats.record(ms(10)); // bucket 0
        stats.record(ms(100)); // bucket 1
        stats.record(ms(250)); // bucket 2
        stats.record(ms(399)); // bucket 3
        let report = stats.record(ms(900)).unwrap(); // overflow bucket
        assert_eq!(report.bucket_width, Some(ms(100)));
        assert_eq!(report.histogram, Some(vec![1, 1, 1, 1, 1]));
    }

    #[test]
    fn test_histogram_needs_pong_timeout() {
        let mut stats = LatencyStats::new(1, Duration::ZERO, true);
        let report = stats.record(ms(10)).unwrap();
        assert!(report.histogram.is_none());
        assert!(report.bucket_width.is_none());
    }
}
