//! Engine Configuration - persistence unit settings
//!
//! Mirrors the handful of persistence-unit properties that change how fetch
//! plans are executed. Values come from defaults, presets or `GRAPHFETCH_*`
//! environment variables.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ModelError;
use crate::loading::GraphSemantic;

/// Configuration error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Persistence unit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrmConfig {
    /// Name of the persistence unit, used in log output
    pub persistence_unit: String,
    /// Maximum join depth for a single fetch plan
    pub max_fetch_depth: usize,
    /// Log the SQL rendered for every executed plan
    pub show_sql: bool,
    /// Semantic applied when a graph is passed to `find` without options
    pub default_graph_semantic: GraphSemantic,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            persistence_unit: "templatePU".to_string(),
            max_fetch_depth: 5,
            show_sql: false,
            default_graph_semantic: GraphSemantic::Fetch,
        }
    }
}

impl OrmConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration for tests: SQL logging on
    pub fn testing() -> Self {
        Self {
            show_sql: true,
            ..Self::default()
        }
    }

    /// Set the persistence unit name
    pub fn with_persistence_unit(mut self, name: impl Into<String>) -> Self {
        self.persistence_unit = name.into();
        self
    }

    /// Set the maximum fetch depth
    pub fn with_max_fetch_depth(mut self, depth: usize) -> Self {
        self.max_fetch_depth = depth;
        self
    }

    /// Enable or disable SQL logging
    pub fn with_show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    /// Set the default graph semantic
    pub fn with_graph_semantic(mut self, semantic: GraphSemantic) -> Self {
        self.default_graph_semantic = semantic;
        self
    }

    /// Load configuration from `GRAPHFETCH_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from `GRAPHFETCH_*` keys resolved by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let persistence_unit = get_or_default(
            &lookup,
            "GRAPHFETCH_PERSISTENCE_UNIT",
            &defaults.persistence_unit,
        );

        let depth = get_or_default(
            &lookup,
            "GRAPHFETCH_MAX_FETCH_DEPTH",
            &defaults.max_fetch_depth.to_string(),
        );
        let max_fetch_depth = depth.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
            field: "max_fetch_depth".to_string(),
            value: depth.clone(),
            expected: "a positive integer".to_string(),
        })?;

        let show_sql = get_or_default(&lookup, "GRAPHFETCH_SHOW_SQL", "false");
        let show_sql = parse_bool(&show_sql).ok_or_else(|| ConfigError::InvalidValue {
            field: "show_sql".to_string(),
            value: show_sql.clone(),
            expected: "true or false".to_string(),
        })?;

        let semantic = get_or_default(&lookup, "GRAPHFETCH_GRAPH_SEMANTIC", "fetch");
        let default_graph_semantic = GraphSemantic::from_str(&semantic)?;

        let config = Self {
            persistence_unit,
            max_fetch_depth,
            show_sql,
            default_graph_semantic,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence_unit.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "persistence_unit".to_string(),
                reason: "Persistence unit name cannot be empty".to_string(),
            });
        }

        if self.max_fetch_depth == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "max_fetch_depth".to_string(),
                reason: "Fetch depth must allow at least one join".to_string(),
            });
        }

        Ok(())
    }
}

fn get_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrmConfig::default();
        assert_eq!(config.persistence_unit, "templatePU");
        assert_eq!(config.default_graph_semantic, GraphSemantic::Fetch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = OrmConfig::new().with_max_fetch_depth(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { ref field, .. }) if field == "max_fetch_depth"
        ));
    }

    #[test]
    fn test_blank_unit_rejected() {
        let config = OrmConfig::new().with_persistence_unit("  ");
        assert!(config.validate().is_err());
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_lookup_defaults_when_unset() {
        let config = OrmConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, OrmConfig::default());
    }

    #[test]
    fn test_lookup_reads_every_key() {
        let config = OrmConfig::from_lookup(lookup(&[
            ("GRAPHFETCH_PERSISTENCE_UNIT", "reportPU"),
            ("GRAPHFETCH_MAX_FETCH_DEPTH", "3"),
            ("GRAPHFETCH_SHOW_SQL", "yes"),
            ("GRAPHFETCH_GRAPH_SEMANTIC", "loadgraph"),
        ]))
        .unwrap();
        assert_eq!(config.persistence_unit, "reportPU");
        assert_eq!(config.max_fetch_depth, 3);
        assert!(config.show_sql);
        assert_eq!(config.default_graph_semantic, GraphSemantic::Load);
    }

    #[test]
    fn test_lookup_rejects_bad_values() {
        let err = OrmConfig::from_lookup(lookup(&[("GRAPHFETCH_MAX_FETCH_DEPTH", "deep")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "max_fetch_depth"));

        let err = OrmConfig::from_lookup(lookup(&[("GRAPHFETCH_SHOW_SQL", "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "show_sql"));

        let err = OrmConfig::from_lookup(lookup(&[("GRAPHFETCH_GRAPH_SEMANTIC", "eager")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "graph_semantic"));

        let err = OrmConfig::from_lookup(lookup(&[("GRAPHFETCH_MAX_FETCH_DEPTH", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed { .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_error_converts_to_model_error() {
        let err: ModelError = ConfigError::ValidationFailed {
            field: "max_fetch_depth".into(),
            reason: "zero".into(),
        }
        .into();
        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
