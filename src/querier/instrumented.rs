//! A decorator that meters Select traffic per querier. Label queries pass
//! through unrecorded.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;

use super::{LabelQueryResult, Querier, SelectHints};
use crate::{
    model::{GraviolaSeriesSet, Matcher},
    observability::metrics,
};

pub struct InstrumentedQuerier {
    name: String,
    querier_type: &'static str,
    inner: Arc<dyn Querier>,
}

impl InstrumentedQuerier {
    pub fn new(
        name: impl Into<String>,
        querier_type: &'static str,
        inner: Arc<dyn Querier>,
    ) -> Self {
        Self {
            name: name.into(),
            querier_type,
            inner,
        }
    }
}

#[async_trait]
impl Querier for InstrumentedQuerier {
    async fn select(
        &self,
        sort_series: bool,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> GraviolaSeriesSet {
        let start = Instant::now();
        metrics::record_querier_query(self.querier_type, &self.name);

        let result = self.inner.select(sort_series, hints, matchers).await;

        metrics::record_querier_latency(
            self.querier_type,
            &self.name,
            start.elapsed().as_secs_f64(),
        );
        result
    }

    async fn label_values(&self, name: &str, matchers: &[Matcher]) -> LabelQueryResult {
        self.inner.label_values(name, matchers).await
    }

    async fn label_names(&self, matchers: &[Matcher]) -> LabelQueryResult {
        self.inner.label_names(matchers).await
    }
}
