//! Failure strategies: how a group reshapes the merged result of its
//! backends before handing it up.

use std::sync::Arc;

use super::LabelQueryResult;
use crate::{config::FailureStrategyKind, model::GraviolaSeriesSet};

pub trait FailureStrategy: Send + Sync {
    fn for_series_set(&self, set: GraviolaSeriesSet) -> GraviolaSeriesSet;
    fn for_labels(&self, result: LabelQueryResult) -> LabelQueryResult;
}

pub fn failure_strategy_for(kind: FailureStrategyKind) -> Arc<dyn FailureStrategy> {
    match kind {
        FailureStrategyKind::FailAll => Arc::new(FailAll),
        FailureStrategyKind::PartialResponse => Arc::new(PartialResponse),
    }
}

/// Identity: whatever error the underlying result carries surfaces untouched.
pub struct FailAll;

impl FailureStrategy for FailAll {
    fn for_series_set(&self, set: GraviolaSeriesSet) -> GraviolaSeriesSet {
        set
    }

    fn for_labels(&self, result: LabelQueryResult) -> LabelQueryResult {
        result
    }
}

/// Downgrades errors when some data was produced. The cleared error survives
/// only if the merge strategy copied it into the annotations; otherwise it is
/// swallowed.
pub struct PartialResponse;

impl FailureStrategy for PartialResponse {
    fn for_series_set(&self, mut set: GraviolaSeriesSet) -> GraviolaSeriesSet {
        if set.error().is_none() {
            return set;
        }

        if set.has_any_samples() {
            set.clear_error();
        }
        set
    }

    fn for_labels(&self, mut result: LabelQueryResult) -> LabelQueryResult {
        if result.error.is_none() {
            return result;
        }

        if !result.values.is_empty() {
            result.error = None;
        }
        result
    }
}
