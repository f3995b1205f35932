//! The top of the querier tree: a root group whose children are the
//! configured groups.

use std::sync::Arc;

use super::{
    Querier,
    failure::{FailAll, failure_strategy_for},
    group::RemoteGroup,
    instrumented::InstrumentedQuerier,
    remote::RemoteQuerier,
    strategy::{AlwaysMerge, merge_strategy_for},
};
use crate::config::StoragesConfig;

/// The queryable handed to the engine. Select fans out across groups with
/// the configured top-level merge strategy; the root failure strategy is
/// always fail-all, so errors the groups did not absorb reach the engine.
pub struct GraviolaStorage {
    root: Arc<RemoteGroup>,
}

impl GraviolaStorage {
    pub fn new(
        groups: Vec<Arc<dyn Querier>>,
        merge_strategy: Arc<dyn super::strategy::MergeStrategy>,
    ) -> Self {
        Self {
            root: Arc::new(RemoteGroup::new(
                "root",
                groups,
                merge_strategy,
                Arc::new(FailAll),
            )),
        }
    }

    /// Build the whole tree out of configuration: remotes inside groups,
    /// each level wrapped with metrics instrumentation.
    pub fn from_config(conf: &StoragesConfig, client: reqwest::Client) -> Self {
        let groups = conf
            .groups
            .iter()
            .map(|group_conf| {
                let remotes = group_conf
                    .remotes
                    .iter()
                    .map(|remote_conf| {
                        let remote = RemoteQuerier::new(remote_conf, client.clone());
                        Arc::new(InstrumentedQuerier::new(
                            remote_conf.name.clone(),
                            "remote",
                            Arc::new(remote),
                        )) as Arc<dyn Querier>
                    })
                    .collect();

                let group = RemoteGroup::new(
                    group_conf.name.clone(),
                    remotes,
                    // Within a group, overlapping backends are merged; the
                    // configured strategy applies across groups at the root.
                    Arc::new(AlwaysMerge),
                    failure_strategy_for(group_conf.on_query_fail),
                );
                Arc::new(InstrumentedQuerier::new(
                    group_conf.name.clone(),
                    "group",
                    Arc::new(group),
                )) as Arc<dyn Querier>
            })
            .collect();

        Self::new(groups, merge_strategy_for(conf.merge_strategy.kind))
    }

    /// The querier for a time window. The bounds do not prune backends in
    /// this version.
    pub fn querier(&self, _mint_ms: i64, _maxt_ms: i64) -> Arc<dyn Querier> {
        self.root.clone()
    }
}
