//! Config validation: registry consistency before introspection.

use crate::config::AdminConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &AdminConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() && config.documents.is_empty() {
        return Err(ConfigError::NoModelsConfigured);
    }
    if config.list.max_results == 0 {
        return Err(ConfigError::Validation("list.max_results must be at least 1".into()));
    }

    let mut names = HashSet::new();
    for entry in config.models() {
        if !names.insert(entry.name.as_str()) {
            return Err(ConfigError::DuplicateModelName(entry.name.clone()));
        }
        if entry.class.trim().is_empty() {
            return Err(ConfigError::Validation(format!("model '{}' has an empty class", entry.name)));
        }
    }
    Ok(())
}

/// Checks that only make sense once properties are known.
pub fn validate_enriched(config: &AdminConfig) -> Result<(), ConfigError> {
    for entry in config.models() {
        for field in &entry.search_fields {
            let Some(property) = entry.property(field) else {
                return Err(ConfigError::MissingReference {
                    kind: "search field",
                    id: format!("{}.{}", entry.name, field),
                });
            };
            if property.is_association() || property.virtual_field {
                return Err(ConfigError::Validation(format!(
                    "{}.{} cannot be searched: not a stored scalar field",
                    entry.name, field
                )));
            }
        }
    }
    Ok(())
}
