//! Backend groups: which remote storages exist, how their answers are merged
//! and what happens when one of them fails.

use std::{
    collections::HashSet,
    sync::OnceLock,
};

use regex::Regex;
use serde::Deserialize;

use super::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoragesConfig {
    /// How series coming from different groups are reconciled.
    #[serde(default)]
    pub merge_strategy: MergeStrategyConfig,

    /// The configured groups. At least one is required.
    pub groups: Vec<GroupConfig>,
}

impl StoragesConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::Validation(
                "storages.groups cannot be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            group.validate()?;
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "group name {} is duplicated",
                    group.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MergeStrategyConfig {
    #[serde(rename = "type", default)]
    pub kind: MergeStrategyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategyKind {
    /// Merge samples of series with equal label sets across backends.
    AlwaysMerge,
    /// Keep only the series with the most samples per label set.
    #[default]
    KeepBiggest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategyKind {
    /// Any backend error fails the whole group.
    #[default]
    FailAll,
    /// Backend errors are swallowed when some data was produced.
    PartialResponse,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Unique group name, used in logs and metrics.
    pub name: String,

    #[serde(default)]
    pub on_query_fail: FailureStrategyKind,

    /// The backends in this group. At least one is required.
    pub remotes: Vec<RemoteConfig>,
}

impl GroupConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Validation("group name cannot be empty".into()));
        }

        if self.remotes.is_empty() {
            return Err(ConfigError::Validation(format!(
                "group {} has no remotes",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for remote in &self.remotes {
            remote.validate()?;
            if !seen.insert(remote.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "remote name {} is duplicated in group {}",
                    remote.name, self.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Backend name, unique within its group.
    pub name: String,

    /// Base URL of the backend, `http://` or `https://`.
    pub address: String,

    /// Optional prefix inserted before `/api/v1/...` on every request.
    #[serde(default)]
    pub path_prefix: Option<String>,
}

impl RemoteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Validation(
                "remote name cannot be empty".into(),
            ));
        }

        if !address_rex().is_match(&self.address) {
            return Err(ConfigError::Validation(format!(
                "remote {} address should start with http:// or https://",
                self.name
            )));
        }

        Ok(())
    }
}

fn address_rex() -> &'static Regex {
    static REX: OnceLock<Regex> = OnceLock::new();
    REX.get_or_init(|| Regex::new("^https?://.+$").unwrap())
}
