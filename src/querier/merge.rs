//! The fan-out executor: runs N child queriers concurrently and reduces
//! their outputs with the injected merge strategy.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use futures::future::join_all;

use super::{LabelQueryResult, Querier, SelectHints, strategy::MergeStrategy};
use crate::model::{Annotations, GraviolaSeriesSet, Matcher, QueryError};

pub struct MergeQuerier {
    children: Vec<Arc<dyn Querier>>,
    merge_strategy: Arc<dyn MergeStrategy>,
}

impl MergeQuerier {
    pub fn new(children: Vec<Arc<dyn Querier>>, merge_strategy: Arc<dyn MergeStrategy>) -> Self {
        Self {
            children,
            merge_strategy,
        }
    }
}

#[async_trait]
impl Querier for MergeQuerier {
    async fn select(
        &self,
        sort_series: bool,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> GraviolaSeriesSet {
        match self.children.len() {
            0 => GraviolaSeriesSet::empty(),
            1 => self.children[0].select(sort_series, hints, matchers).await,
            _ => {
                // The merge strategies need sorted inputs, so sorting is
                // forced on every child regardless of what the caller asked.
                let pending = self
                    .children
                    .iter()
                    .map(|child| child.select(true, hints, matchers));
                let sets = join_all(pending).await;
                self.merge_strategy.merge(sets)
            }
        }
    }

    async fn label_values(&self, name: &str, matchers: &[Matcher]) -> LabelQueryResult {
        match self.children.len() {
            0 => LabelQueryResult::default(),
            1 => dedupe_unless_failed(self.children[0].label_values(name, matchers).await),
            _ => {
                let pending = self
                    .children
                    .iter()
                    .map(|child| child.label_values(name, matchers));
                combine_label_results(join_all(pending).await)
            }
        }
    }

    async fn label_names(&self, matchers: &[Matcher]) -> LabelQueryResult {
        match self.children.len() {
            0 => LabelQueryResult::default(),
            1 => dedupe_unless_failed(self.children[0].label_names(matchers).await),
            _ => {
                let pending = self
                    .children
                    .iter()
                    .map(|child| child.label_names(matchers));
                combine_label_results(join_all(pending).await)
            }
        }
    }
}

/// Union the annotations, fold each child error into the annotations as well,
/// concatenate the surviving value lists and deduplicate. The top-level error
/// is the join of all child errors.
fn combine_label_results(results: Vec<LabelQueryResult>) -> LabelQueryResult {
    let mut annotations = Annotations::new();
    let mut errors = Vec::new();
    let mut values = Vec::new();

    for result in results {
        annotations.merge(&result.annotations);
        if let Some(err) = result.error {
            annotations.add(err.to_string());
            errors.push(err);
            continue;
        }
        values.extend(result.values);
    }

    LabelQueryResult {
        values: dedupe(values),
        annotations,
        error: QueryError::join(errors),
    }
}

fn dedupe_unless_failed(mut result: LabelQueryResult) -> LabelQueryResult {
    if result.error.is_none() {
        result.values = dedupe(result.values);
    }
    result
}

/// Set-semantics dedup; the resulting order is arbitrary, callers needing
/// order sort externally.
fn dedupe(values: Vec<String>) -> Vec<String> {
    let set: HashSet<String> = values.into_iter().collect();
    set.into_iter().collect()
}
