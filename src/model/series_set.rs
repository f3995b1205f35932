//! The series-set handed to the engine: decoded eagerly, iterated through a
//! forward-only cursor.

use super::{Annotations, GraviolaSeries, QueryError};

/// A set of series plus the diagnostics that came with them. The whole
/// response is decoded up front (memory proportional to one response set per
/// backend); the cursor only sequences access for the engine.
///
/// If a fatal error is set, `advance` returns false immediately: a set with
/// an error yields no series. Warnings alone do not abort iteration.
#[derive(Debug, Default)]
pub struct GraviolaSeriesSet {
    series: Vec<GraviolaSeries>,
    annotations: Annotations,
    error: Option<QueryError>,
    cursor: usize,
}

impl GraviolaSeriesSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_series(series: Vec<GraviolaSeries>) -> Self {
        Self {
            series,
            ..Default::default()
        }
    }

    pub fn from_error(error: QueryError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Move the cursor to the next series. False once exhausted or when a
    /// fatal error is set.
    pub fn advance(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }

        if self.cursor < self.series.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// The series at the cursor. Must only be called after a successful
    /// `advance`.
    pub fn current(&self) -> &GraviolaSeries {
        &self.series[self.cursor - 1]
    }

    pub fn warnings(&self) -> &Annotations {
        &self.annotations
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    pub fn series(&self) -> &[GraviolaSeries] {
        &self.series
    }

    pub fn add_annotation(&mut self, message: impl Into<String>) {
        self.annotations.add(message);
    }

    pub fn merge_annotations(&mut self, other: &Annotations) {
        self.annotations.merge(other);
    }

    pub fn set_error(&mut self, error: QueryError) {
        self.error = Some(error);
    }

    pub fn clear_error(&mut self) -> Option<QueryError> {
        self.error.take()
    }

    /// Sort series by label set. Stable, so equal label sets keep their
    /// relative (backend) order.
    pub fn sort_series(&mut self) {
        self.series.sort_by(|a, b| a.labels.cmp(&b.labels));
    }

    /// Whether at least one series carries at least one sample. Drives the
    /// partial-response downgrade decision.
    pub fn has_any_samples(&self) -> bool {
        self.series.iter().any(|series| !series.samples.is_empty())
    }

    /// Total number of samples across all series, for the engine's sample
    /// budget accounting.
    pub fn total_samples(&self) -> u64 {
        self.series
            .iter()
            .map(|series| series.samples.len() as u64)
            .sum()
    }

    pub fn into_parts(self) -> (Vec<GraviolaSeries>, Annotations, Option<QueryError>) {
        (self.series, self.annotations, self.error)
    }
}
