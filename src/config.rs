//! Configuration for the type generator
//!
//! Reads a `pg-typegen.toml` configuration file, or can be constructed
//! directly by library callers who don't need a file on disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Settings controlling how a [`crate::generator::Generator`] resolves
/// schema names and renders types.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// Schema searched for unqualified table/view references.
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Target-language type used when a SQL type has no known mapping.
    #[serde(default = "default_fallback_type")]
    pub fallback_type: String,

    /// Per-SQL-type overrides, checked before the built-in type catalog.
    #[serde(default)]
    pub type_override_map: HashMap<String, String>,

    /// Pretty-printing knobs applied by the formatter.
    #[serde(default)]
    pub pretty_options: PrettyOptions,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_schema: default_schema(),
            fallback_type: default_fallback_type(),
            type_override_map: HashMap::new(),
            pretty_options: PrettyOptions::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_schema.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_schema must not be empty".to_string(),
            ));
        }
        if self.fallback_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fallback_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Knobs for the final type-string rendering. Name/type pairing itself is
/// delegated to a caller-supplied `ColumnFormatter` closure, so this only
/// covers union-branch joining.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrettyOptions {
    /// Separator written between union branches.
    #[serde(default = "default_union_separator")]
    pub union_separator: String,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self {
            union_separator: default_union_separator(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_fallback_type() -> String {
    "string".to_string()
}

fn default_union_separator() -> String {
    " | ".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_schema, "public");
        assert_eq!(config.fallback_type, "string");
    }

    #[test]
    fn empty_default_schema_fails_validation() {
        let mut config = GeneratorConfig::default();
        config.default_schema = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn type_override_map_round_trips_through_toml() {
        let toml_src = r#"
            default_schema = "app"
            fallback_type = "unknown"

            [type_override_map]
            mpaa_rating = "Rating"
        "#;
        let config: GeneratorConfig = toml::from_str(toml_src).expect("parse");
        assert_eq!(config.default_schema, "app");
        assert_eq!(
            config.type_override_map.get("mpaa_rating").map(String::as_str),
            Some("Rating")
        );
    }
}
