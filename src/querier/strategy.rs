//! Merge strategies: how series sets coming from different backends are
//! reconciled into one. Both strategies require their inputs to be sorted by
//! label set; the merge querier forces sorting before calling them.

use std::sync::Arc;

use crate::{
    config::MergeStrategyKind,
    model::{Annotations, GraviolaSeries, GraviolaSeriesSet, QueryError, Sample},
};

pub trait MergeStrategy: Send + Sync {
    fn merge(&self, sets: Vec<GraviolaSeriesSet>) -> GraviolaSeriesSet;
}

pub fn merge_strategy_for(kind: MergeStrategyKind) -> Arc<dyn MergeStrategy> {
    match kind {
        MergeStrategyKind::AlwaysMerge => Arc::new(AlwaysMerge),
        MergeStrategyKind::KeepBiggest => Arc::new(KeepBiggest),
    }
}

/// Merges all series with equal label sets into one, concatenating samples.
/// On duplicate timestamps the first-seen sample wins, which makes the result
/// depend on backend order (kept that way on purpose). Annotations are
/// unioned and errors joined into the output set.
pub struct AlwaysMerge;

impl MergeStrategy for AlwaysMerge {
    fn merge(&self, mut sets: Vec<GraviolaSeriesSet>) -> GraviolaSeriesSet {
        if sets.is_empty() {
            return GraviolaSeriesSet::empty();
        }
        if sets.len() == 1 {
            return sets.remove(0);
        }

        let mut annotations = Annotations::new();
        let mut errors = Vec::new();
        let mut flat: Vec<GraviolaSeries> = Vec::new();

        for set in sets {
            let (series, annots, error) = set.into_parts();
            annotations.merge(&annots);
            if let Some(err) = error {
                errors.push(err);
            }
            flat.extend(series);
        }

        // Stable sort: equal label sets keep their input (backend) order.
        flat.sort_by(|a, b| a.labels.cmp(&b.labels));

        let mut merged: Vec<GraviolaSeries> = Vec::with_capacity(flat.len());
        for series in flat {
            match merged.last_mut() {
                Some(last) if last.labels == series.labels => {
                    last.samples.extend(series.samples);
                }
                _ => merged.push(series),
            }
        }

        for series in &mut merged {
            series.samples.sort_by_key(|sample| sample.timestamp_ms);
            dedupe_timestamps(&mut series.samples);
        }

        let mut out = GraviolaSeriesSet::from_series(merged).with_annotations(annotations);
        if let Some(err) = QueryError::join(errors) {
            out.set_error(err);
        }
        out
    }
}

fn dedupe_timestamps(samples: &mut Vec<Sample>) {
    samples.dedup_by_key(|sample| sample.timestamp_ms);
}

/// Keeps, per label set, only the series with strictly the most samples;
/// ties resolve to the first occurrence. Samples are never mixed across
/// backends. Annotations and errors are not carried over.
pub struct KeepBiggest;

impl MergeStrategy for KeepBiggest {
    fn merge(&self, mut sets: Vec<GraviolaSeriesSet>) -> GraviolaSeriesSet {
        if sets.is_empty() {
            return GraviolaSeriesSet::empty();
        }
        if sets.len() == 1 {
            return sets.remove(0);
        }

        let mut flat: Vec<GraviolaSeries> = Vec::new();
        for set in sets {
            let (series, _, _) = set.into_parts();
            flat.extend(series);
        }

        if flat.is_empty() {
            return GraviolaSeriesSet::empty();
        }

        flat.sort_by(|a, b| a.labels.cmp(&b.labels));

        let mut kept: Vec<GraviolaSeries> = Vec::with_capacity(flat.len());
        for series in flat {
            match kept.last_mut() {
                Some(last) if last.labels == series.labels => {
                    if series.samples.len() > last.samples.len() {
                        *last = series;
                    }
                }
                _ => kept.push(series),
            }
        }

        GraviolaSeriesSet::from_series(kept)
    }
}
