//! The leaf of the querier tree: one querier per configured backend,
//! translating Select and label calls into Prometheus HTTP API requests.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{
    LabelQueryResult, Querier, SelectHints,
    response::{self, Envelope, STATUS_ERROR},
};
use crate::{
    config::RemoteConfig,
    model::{Annotations, GraviolaSeriesSet, Matcher, QueryError, selector_string},
};

pub const INSTANT_QUERY_PATH: &str = "/api/v1/query";
pub const RANGE_QUERY_PATH: &str = "/api/v1/query_range";
pub const LABEL_NAMES_PATH: &str = "/api/v1/labels";

/// Step sent to backends when a range Select carries no step hint.
const DEFAULT_STEP_SECONDS: i64 = 30;

/// Issues HTTP requests against a single Prometheus-compatible backend and
/// decodes the answers. The reqwest client is process-shared; its per-request
/// timeout is the per-backend timeout, and a timeout surfaces as a transport
/// error like any other failure.
pub struct RemoteQuerier {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl RemoteQuerier {
    pub fn new(conf: &RemoteConfig, client: reqwest::Client) -> Self {
        let mut base_url = conf.address.trim_end_matches('/').to_string();
        if let Some(prefix) = conf.path_prefix.as_deref() {
            let prefix = prefix.trim_matches('/');
            if !prefix.is_empty() {
                base_url = format!("{base_url}/{prefix}");
            }
        }

        Self {
            name: conf.name.clone(),
            base_url,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute_select(
        &self,
        hints: &SelectHints,
        matchers: &[Matcher],
        sort_series: bool,
    ) -> Result<GraviolaSeriesSet, QueryError> {
        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("query", selector_string(matchers));

        // Internal hints are in milliseconds; the wire speaks whole seconds.
        let url = if hints.start_ms == 0 && hints.end_ms == 0 {
            self.url(INSTANT_QUERY_PATH)
        } else if hints.start_ms == hints.end_ms {
            params.insert("time", (hints.start_ms / 1000).to_string());
            self.url(INSTANT_QUERY_PATH)
        } else {
            params.insert("start", (hints.start_ms / 1000).to_string());
            params.insert("end", (hints.end_ms / 1000).to_string());
            let step = if hints.step_ms > 0 {
                hints.step_ms / 1000
            } else {
                DEFAULT_STEP_SECONDS
            };
            params.insert("step", step.to_string());
            self.url(RANGE_QUERY_PATH)
        };

        let response = self.client.post(&url).form(&params).send().await?;
        let envelope = decode_envelope(response).await?;

        let data = envelope
            .data
            .ok_or_else(|| QueryError::Decode("response has no data field".into()))?;
        let series = response::decode_series_data(data)?;

        let mut set = GraviolaSeriesSet::from_series(series);
        if sort_series {
            set.sort_series();
        }
        for warning in envelope.warnings {
            set.add_annotation(warning);
        }
        Ok(set)
    }

    async fn execute_label_query(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<LabelQueryResult, QueryError> {
        let response = request.send().await?;
        let envelope = decode_envelope(response).await?;

        let data = envelope
            .data
            .ok_or_else(|| QueryError::Decode("response has no data field".into()))?;
        let values = response::decode_label_data(data)?;

        Ok(LabelQueryResult {
            values,
            annotations: envelope.warnings.into_iter().collect::<Annotations>(),
            error: None,
        })
    }
}

#[async_trait]
impl Querier for RemoteQuerier {
    async fn select(
        &self,
        sort_series: bool,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> GraviolaSeriesSet {
        match self.execute_select(hints, matchers, sort_series).await {
            Ok(set) => set,
            Err(err) => {
                tracing::warn!(remote = %self.name, error = %err, "select against backend failed");
                GraviolaSeriesSet::from_error(err)
            }
        }
    }

    async fn label_values(&self, name: &str, matchers: &[Matcher]) -> LabelQueryResult {
        let url = self.url(&format!("/api/v1/label/{name}/values"));
        let query: Vec<(&str, String)> = matchers
            .iter()
            .map(|m| ("match[]", m.to_string()))
            .collect();

        match self
            .execute_label_query(self.client.get(&url).query(&query))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(remote = %self.name, error = %err, "label values against backend failed");
                LabelQueryResult::from_error(err)
            }
        }
    }

    async fn label_names(&self, matchers: &[Matcher]) -> LabelQueryResult {
        let form: Vec<(&str, String)> = matchers
            .iter()
            .map(|m| ("match[]", m.to_string()))
            .collect();

        match self
            .execute_label_query(self.client.post(self.url(LABEL_NAMES_PATH)).form(&form))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(remote = %self.name, error = %err, "label names against backend failed");
                LabelQueryResult::from_error(err)
            }
        }
    }
}

async fn decode_envelope(response: reqwest::Response) -> Result<Envelope, QueryError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(QueryError::HttpStatus(status.as_u16()));
    }

    let envelope: Envelope =
        serde_json::from_slice(&body).map_err(|e| QueryError::Decode(e.to_string()))?;

    if envelope.status == STATUS_ERROR {
        return Err(QueryError::Reported(
            envelope.error.unwrap_or_else(|| "unknown error".into()),
        ));
    }

    Ok(envelope)
}
