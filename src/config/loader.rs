//! Load the model registry and mapping declarations from JSON, with environment overrides.

use crate::case::class_short_name;
use crate::config::{validate, AdminConfig};
use crate::error::ConfigError;
use crate::metadata::{Backend, DocumentMapping, DocumentSchemaProvider, EntityMapping, RelationalSchemaProvider};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Database schema for tables whose mapping omits one. From env `BACKOFFICE_SCHEMA`, default `public`.
pub fn default_schema() -> String {
    std::env::var("BACKOFFICE_SCHEMA").unwrap_or_else(|_| "public".into())
}

/// Page size override from env `BACKOFFICE_MAX_RESULTS`. Ignored unless a positive integer.
pub fn max_results_from_env() -> Option<u64> {
    std::env::var("BACKOFFICE_MAX_RESULTS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

/// Parse, normalize and validate an admin configuration document.
pub fn load_from_str(json: &str) -> Result<AdminConfig, ConfigError> {
    let raw: Value = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    load_from_value(raw)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AdminConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&text)
}

pub fn load_from_value(raw: Value) -> Result<AdminConfig, ConfigError> {
    let Value::Object(mut root) = raw else {
        return Err(ConfigError::Load("admin config must be a JSON object".into()));
    };
    for (section, backend) in [("entities", Backend::Relational), ("documents", Backend::Document)] {
        if let Some(registry) = root.remove(section) {
            root.insert(section.to_string(), Value::Object(normalize_registry(section, registry, backend)?));
        }
    }
    let mut config: AdminConfig =
        serde_json::from_value(Value::Object(root)).map_err(|e| ConfigError::Load(e.to_string()))?;
    if let Some(n) = max_results_from_env() {
        config.list.max_results = n;
    }
    validate(&config)?;
    tracing::info!(
        entities = config.entities.len(),
        documents = config.documents.len(),
        max_results = config.list.max_results,
        "admin config loaded"
    );
    Ok(config)
}

/// Accepted registry shapes:
///
/// ```json
/// { "entities": ["App\\Entity\\User"] }
/// { "entities": { "User": "App\\Entity\\User" } }
/// { "entities": { "User": { "class": "App\\Entity\\User", "label": "Clients" } } }
/// ```
///
/// All become the object form, keyed by model name, with `name` and `backend` set.
fn normalize_registry(section: &str, registry: Value, backend: Backend) -> Result<Map<String, Value>, ConfigError> {
    let entries: Vec<(String, Value)> = match registry {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(class) => Ok((class_short_name(&class).to_string(), Value::String(class))),
                other => Err(ConfigError::Load(format!(
                    "{}: list entries must be class names, got {}",
                    section, other
                ))),
            })
            .collect::<Result<_, _>>()?,
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(ConfigError::Load(format!(
                "{} must be a list or a map, got {}",
                section, other
            )))
        }
    };

    let mut out = Map::new();
    for (name, entry) in entries {
        let mut obj = match entry {
            Value::String(class) => {
                let mut obj = Map::new();
                obj.insert("class".into(), Value::String(class));
                obj
            }
            Value::Object(obj) => obj,
            other => {
                return Err(ConfigError::Load(format!(
                    "{}.{}: expected class name or object, got {}",
                    section, name, other
                )))
            }
        };
        obj.insert("name".into(), Value::String(name.clone()));
        if !obj.contains_key("backend") {
            obj.insert("backend".into(), serde_json::to_value(backend).map_err(|e| ConfigError::Load(e.to_string()))?);
        }
        if out.insert(name.clone(), Value::Object(obj)).is_some() {
            return Err(ConfigError::DuplicateModelName(name));
        }
    }
    Ok(out)
}

/// Mapping declarations for both persistence backends.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingSet {
    #[serde(default)]
    pub entities: Vec<EntityMapping>,
    #[serde(default)]
    pub documents: Vec<DocumentMapping>,
}

impl MappingSet {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn into_providers(self, default_schema: &str) -> Result<(RelationalSchemaProvider, DocumentSchemaProvider), ConfigError> {
        let relational = RelationalSchemaProvider::new(&self.entities, default_schema)?;
        let document = DocumentSchemaProvider::new(&self.documents);
        Ok((relational, document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_registry_shapes_normalize_to_objects() {
        let config = load_from_str(
            r#"{
                "entities": {
                    "Category": "App\\Entity\\Category",
                    "User": { "class": "App\\Entity\\User", "label": "Clients" }
                },
                "documents": ["App\\Document\\Product"]
            }"#,
        )
        .unwrap();
        let category = &config.entities["Category"];
        assert_eq!(category.name, "Category");
        assert_eq!(category.class, "App\\Entity\\Category");
        assert_eq!(category.backend, Some(Backend::Relational));
        assert_eq!(config.entities["User"].label(), "Clients");
        let product = &config.documents["Product"];
        assert_eq!(product.class, "App\\Document\\Product");
        assert_eq!(product.backend, Some(Backend::Document));
    }

    #[test]
    fn explicit_backend_hint_is_kept() {
        let config = load_from_str(
            r#"{ "entities": { "Log": { "class": "App\\Model\\Log", "backend": "document" } } }"#,
        )
        .unwrap();
        assert_eq!(config.entities["Log"].backend, Some(Backend::Document));
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(matches!(load_from_str("{}"), Err(ConfigError::NoModelsConfigured)));
    }

    #[test]
    fn malformed_entries_fail_to_load() {
        assert!(matches!(
            load_from_str(r#"{ "entities": { "Category": 42 } }"#),
            Err(ConfigError::Load(_))
        ));
        assert!(matches!(load_from_str("[]"), Err(ConfigError::Load(_))));
    }
}
