//! A named group of backends: fan out through a merge querier, then let the
//! group's failure strategy decide what an error means.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    LabelQueryResult, Querier, SelectHints,
    failure::FailureStrategy,
    merge::MergeQuerier,
    strategy::MergeStrategy,
};
use crate::model::{GraviolaSeriesSet, Matcher};

pub struct RemoteGroup {
    name: String,
    remotes: Vec<Arc<dyn Querier>>,
    merge_strategy: Arc<dyn MergeStrategy>,
    failure_strategy: Arc<dyn FailureStrategy>,
}

impl RemoteGroup {
    pub fn new(
        name: impl Into<String>,
        remotes: Vec<Arc<dyn Querier>>,
        merge_strategy: Arc<dyn MergeStrategy>,
        failure_strategy: Arc<dyn FailureStrategy>,
    ) -> Self {
        Self {
            name: name.into(),
            remotes,
            merge_strategy,
            failure_strategy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn merge_querier(&self) -> MergeQuerier {
        MergeQuerier::new(self.remotes.clone(), self.merge_strategy.clone())
    }
}

#[async_trait]
impl Querier for RemoteGroup {
    async fn select(
        &self,
        sort_series: bool,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> GraviolaSeriesSet {
        tracing::debug!(group = %self.name, ?hints, "group select");
        let merged = self
            .merge_querier()
            .select(sort_series, hints, matchers)
            .await;
        self.failure_strategy.for_series_set(merged)
    }

    async fn label_values(&self, name: &str, matchers: &[Matcher]) -> LabelQueryResult {
        let merged = self.merge_querier().label_values(name, matchers).await;
        self.failure_strategy.for_labels(merged)
    }

    async fn label_names(&self, matchers: &[Matcher]) -> LabelQueryResult {
        let merged = self.merge_querier().label_names(matchers).await;
        self.failure_strategy.for_labels(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{GraviolaSeries, LabelSet, QueryError, Sample},
        querier::{
            failure::{FailAll, PartialResponse},
            merge::tests::MockQuerier,
            strategy::AlwaysMerge,
        },
    };

    fn up_series() -> GraviolaSeries {
        GraviolaSeries::new(
            LabelSet::from_pairs([("__name__", "up")]),
            vec![Sample::new(1000, 1.0)],
        )
    }

    #[tokio::test]
    async fn fail_all_group_surfaces_a_single_backend_failure() {
        let ok = Arc::new(MockQuerier::returning(vec![up_series()]));
        let failing = Arc::new(MockQuerier::failing(QueryError::HttpStatus(500)));
        let group = RemoteGroup::new(
            "g",
            vec![ok, failing],
            Arc::new(AlwaysMerge),
            Arc::new(FailAll),
        );

        let set = group.select(false, &SelectHints::default(), &[]).await;
        assert!(set.error().is_some());
    }

    #[tokio::test]
    async fn partial_response_group_swallows_the_failure_when_data_survived() {
        let ok = Arc::new(MockQuerier::returning(vec![up_series()]));
        let failing = Arc::new(MockQuerier::failing(QueryError::HttpStatus(500)));
        let group = RemoteGroup::new(
            "g",
            vec![ok, failing],
            Arc::new(AlwaysMerge),
            Arc::new(PartialResponse),
        );

        let set = group.select(false, &SelectHints::default(), &[]).await;
        assert!(set.error().is_none());
        assert_eq!(set.series().len(), 1);
    }

    #[tokio::test]
    async fn partial_response_group_keeps_the_failure_when_every_backend_failed() {
        let first = Arc::new(MockQuerier::failing(QueryError::HttpStatus(500)));
        let second = Arc::new(MockQuerier::failing(QueryError::HttpStatus(502)));
        let group = RemoteGroup::new(
            "g",
            vec![first, second],
            Arc::new(AlwaysMerge),
            Arc::new(PartialResponse),
        );

        let set = group.select(false, &SelectHints::default(), &[]).await;
        assert!(set.error().is_some());
    }

    #[tokio::test]
    async fn label_queries_run_through_the_failure_strategy_too() {
        let ok = Arc::new(MockQuerier::with_label_values(&["a"]));
        let failing = Arc::new(MockQuerier::failing(QueryError::HttpStatus(500)));
        let group = RemoteGroup::new(
            "g",
            vec![ok, failing],
            Arc::new(AlwaysMerge),
            Arc::new(PartialResponse),
        );

        let result = group.label_values("job", &[]).await;
        assert!(result.error.is_none());
        assert_eq!(result.values, vec!["a"]);
    }
}
