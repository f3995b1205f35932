//! The federated query pipeline: a tree of queriers fanning out selection and
//! label requests, with pluggable merge and failure strategies between the
//! levels.
//!
//! The tree is `GraviolaStorage` (root) → `RemoteGroup` (one per configured
//! group) → `RemoteQuerier` (one per backend). Errors never bubble out as
//! `Result`: they travel inside the returned values so strategies can reshape
//! them on the way up.

pub mod failure;
pub mod group;
pub mod instrumented;
pub mod merge;
pub mod remote;
mod response;
pub mod storage;
pub mod strategy;

use async_trait::async_trait;

use crate::model::{Annotations, GraviolaSeriesSet, Matcher, QueryError};

/// Time bounds for a Select call, in Unix milliseconds.
///
/// `start == end == 0` is an instant query without a pinned time,
/// `start == end != 0` a pinned instant query, `start < end` a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectHints {
    pub start_ms: i64,
    pub end_ms: i64,
    pub step_ms: i64,
}

/// Result of a label-names or label-values call. Like series sets, the error
/// is carried inside the value.
#[derive(Debug, Default)]
pub struct LabelQueryResult {
    pub values: Vec<String>,
    pub annotations: Annotations,
    pub error: Option<QueryError>,
}

impl LabelQueryResult {
    pub fn from_values(values: Vec<String>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn from_error(error: QueryError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// A node in the querier tree. Implementations must be cheap to share and
/// safe to call concurrently; per-call state lives in local temporaries.
#[async_trait]
pub trait Querier: Send + Sync {
    /// Fetch the series matching `matchers` within the hinted time bounds.
    /// When `sort_series` is set, the returned series are ordered by label
    /// set (the merge strategies require sorted inputs).
    async fn select(
        &self,
        sort_series: bool,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> GraviolaSeriesSet;

    /// All potential values for a label name.
    async fn label_values(&self, name: &str, matchers: &[Matcher]) -> LabelQueryResult;

    /// All label names present in the matched series.
    async fn label_names(&self, matchers: &[Matcher]) -> LabelQueryResult;
}
