//! Time series: a label set plus timestamp-ordered samples.

use super::LabelSet;

/// One datapoint. Timestamps are Unix milliseconds; NaN is a legal value and
/// is preserved end to end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// A series owned by the set that produced it. Samples are ordered by
/// ascending timestamp and never mutated after emission.
#[derive(Debug, Clone, PartialEq)]
pub struct GraviolaSeries {
    pub labels: LabelSet,
    pub samples: Vec<Sample>,
}

impl GraviolaSeries {
    pub fn new(labels: LabelSet, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }

    /// The newest sample with `after_ms < timestamp <= until_ms`, the lookup
    /// instant-vector evaluation performs per step.
    pub fn latest_in_window(&self, after_ms: i64, until_ms: i64) -> Option<Sample> {
        let idx = self
            .samples
            .partition_point(|sample| sample.timestamp_ms <= until_ms);
        if idx == 0 {
            return None;
        }

        let candidate = self.samples[idx - 1];
        (candidate.timestamp_ms > after_ms).then_some(candidate)
    }

    /// All samples with `start_ms <= timestamp <= end_ms`, in order.
    pub fn samples_in_window(&self, start_ms: i64, end_ms: i64) -> &[Sample] {
        let from = self
            .samples
            .partition_point(|sample| sample.timestamp_ms < start_ms);
        let to = self
            .samples
            .partition_point(|sample| sample.timestamp_ms <= end_ms);
        &self.samples[from..to]
    }
}
