// Copyright 2025 Cowboy AI, LLC.

//! Composer configuration
//!
//! Read from a JSON file with missing fields defaulted, then overridden by
//! `CIM_COMPOSE_*` environment variables.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ComposeError, ComposeResult};
use crate::pool::default_pool_size;
use crate::search::{SearchConfig, SearchMode, StrategyKind};

/// Overrides `search.max_depth`
pub const ENV_MAX_DEPTH: &str = "CIM_COMPOSE_MAX_DEPTH";
/// Overrides `search.deadline_ms`
pub const ENV_DEADLINE_MS: &str = "CIM_COMPOSE_DEADLINE_MS";
/// Overrides `pool_size`
pub const ENV_POOL_SIZE: &str = "CIM_COMPOSE_POOL_SIZE";
/// Overrides `search.mode` (`first-solution` or `exhaustive`)
pub const ENV_MODE: &str = "CIM_COMPOSE_MODE";

/// Everything a [`Composer`](crate::composer::Composer) needs besides the
/// catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
    /// Per-search knobs
    pub search: SearchConfig,
    /// Worker count; `None` means `max(hardware parallelism, 2)`
    pub pool_size: Option<usize>,
    /// Strategies bound round-robin to worker slots
    pub strategies: Vec<StrategyKind>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            pool_size: None,
            strategies: StrategyKind::all(),
        }
    }
}

impl ComposerConfig {
    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> ComposeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ComposeError::Configuration(format!("invalid config: {e}")))
    }

    /// Read a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ComposeResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ComposeError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Apply `CIM_COMPOSE_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> ComposeResult<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ComposeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(depth) = parse_var::<usize>(&lookup, ENV_MAX_DEPTH)? {
            self.search.max_depth = depth;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_DEADLINE_MS)? {
            self.search.deadline_ms = Some(ms);
        }
        if let Some(size) = parse_var::<usize>(&lookup, ENV_POOL_SIZE)? {
            self.pool_size = Some(size);
        }
        if let Some(mode) = lookup(ENV_MODE) {
            self.search.mode = match mode.trim() {
                "first-solution" => SearchMode::FirstSolution,
                "exhaustive" => SearchMode::Exhaustive,
                other => {
                    return Err(ComposeError::Configuration(format!(
                        "{ENV_MODE}: unknown mode {other}"
                    )))
                }
            };
        }
        Ok(())
    }

    /// Reject values the composer cannot run with
    pub fn validate(&self) -> ComposeResult<()> {
        self.search.validate()?;
        if self.pool_size == Some(0) {
            return Err(ComposeError::Configuration(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.strategies.is_empty() {
            return Err(ComposeError::Configuration(
                "at least one strategy is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count with the default applied
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(default_pool_size)
    }

    /// Set the depth ceiling
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.search.max_depth = max_depth;
        self
    }

    /// Set the wall-clock budget per challenge
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.search = self.search.with_deadline(deadline);
        self
    }

    /// Set the worker count
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Set the stop condition
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.search.mode = mode;
        self
    }

    /// Set the strategies bound to worker slots
    pub fn with_strategies(mut self, strategies: Vec<StrategyKind>) -> Self {
        self.strategies = strategies;
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> ComposeResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => {
            let value = raw
                .trim()
                .parse()
                .map_err(|e| ComposeError::Configuration(format!("{key}={raw}: {e}")))?;
            debug!(key, value = %raw.trim(), "environment override");
            Ok(Some(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_bind_every_strategy() {
        let config = ComposerConfig::default();
        assert_eq!(config.strategies, StrategyKind::all());
        assert!(config.effective_pool_size() >= 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_fields_default_when_missing() {
        let config = ComposerConfig::from_json_str(
            r#"{"pool_size": 3, "strategies": ["cost-guided"], "search": {"max_depth": 6}}"#,
        )
        .unwrap();
        assert_eq!(config.pool_size, Some(3));
        assert_eq!(config.strategies, vec![StrategyKind::CostGuided]);
        assert_eq!(config.search.max_depth, 6);
        assert!(config.search.collapse_equivalents);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            ComposerConfig::from_json_str(r#"{"threads": 4}"#),
            Err(ComposeError::Configuration(_))
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = ComposerConfig::default().with_max_depth(4);
        config
            .apply_overrides(lookup(&[
                (ENV_MAX_DEPTH, "7"),
                (ENV_DEADLINE_MS, "250"),
                (ENV_POOL_SIZE, " 5 "),
                (ENV_MODE, "first-solution"),
            ]))
            .unwrap();
        assert_eq!(config.search.max_depth, 7);
        assert_eq!(config.search.deadline(), Some(Duration::from_millis(250)));
        assert_eq!(config.effective_pool_size(), 5);
        assert_eq!(config.search.mode, SearchMode::FirstSolution);
    }

    #[test]
    fn malformed_overrides_are_configuration_errors() {
        let mut config = ComposerConfig::default();
        assert!(config.apply_overrides(lookup(&[(ENV_MAX_DEPTH, "deep")])).is_err());
        assert!(config.apply_overrides(lookup(&[(ENV_MODE, "greedy")])).is_err());
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        assert!(ComposerConfig::default().with_pool_size(0).validate().is_err());
        assert!(ComposerConfig::default().with_strategies(vec![]).validate().is_err());
        assert!(ComposerConfig::default().with_max_depth(0).validate().is_err());
    }
}
