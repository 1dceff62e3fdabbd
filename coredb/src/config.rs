//! Store configuration.
//!
//! Read from a TOML file, usually `coredb.toml` next to the project:
//!
//! ```toml
//! schema = "resources/custom.schema.json"
//! templates = "resources/templates"
//!
//! [limits]
//! monitor = 100
//! cell_zone = 1000
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{error::Result, ids::IdLimits, schema::Schema, template::Templates};

/// Settings shared by every document of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Schema document replacing the packaged one.
    pub schema: Option<PathBuf>,
    /// Directory whose fragments override the packaged templates.
    pub templates: Option<PathBuf>,
    /// Upper bounds of the id namespaces.
    pub limits: IdLimits,
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading store config {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// JSON Schema describing the configuration file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(StoreConfig)).unwrap_or_default()
    }

    /// Compile the configured schema, or the packaged one.
    pub fn load_schema(&self) -> Result<Arc<Schema>> {
        let schema = match &self.schema {
            Some(path) => Schema::from_path(path)?,
            None => Schema::builtin()?,
        };
        Ok(Arc::new(schema))
    }

    /// Parse the configured templates, or the packaged ones.
    pub fn load_templates(&self) -> Result<Arc<Templates>> {
        let templates = match &self.templates {
            Some(dir) => Templates::from_dir(dir)?,
            None => Templates::builtin()?,
        };
        Ok(Arc::new(templates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.limits.monitor, 100);
        assert!(config.load_schema().is_ok());
    }

    #[test]
    fn test_partial_limits() {
        let config = StoreConfig::from_toml_str(
            r#"
            templates = "custom"
            [limits]
            cell_zone = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.templates, Some(PathBuf::from("custom")));
        assert_eq!(config.limits.cell_zone, 10);
        assert_eq!(config.limits.boundary_condition, 10000);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(StoreConfig::from_toml_str("colour = 1").is_err());
        assert!(StoreConfig::from_toml_str("[limits]\nzones = 1").is_err());
    }

    #[test]
    fn test_json_schema_lists_fields() {
        let schema = StoreConfig::json_schema();
        let properties = &schema["properties"];
        assert!(properties.get("limits").is_some());
        assert!(properties.get("schema").is_some());
    }
}
