//! Admin configuration: the declarative model registry and its enriched form.

use crate::case::humanize;
use crate::config::{PropertyConfig, SearchableField};
use crate::metadata::Backend;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RESULTS: u64 = 15;

fn default_max_results() -> u64 {
    DEFAULT_MAX_RESULTS
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        ListConfig {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// One configured model (entity or document).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Logical model name; filled from the registry key when loading.
    #[serde(default)]
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Backend hint. Entities default to relational, documents to document.
    #[serde(default)]
    pub backend: Option<Backend>,
    /// Extra properties to show; unknown to the metadata they become virtual.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Restrict free-text search to these properties.
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub primary_key_field_name: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyConfig>,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        ModelEntry {
            name: name.into(),
            class: class.into(),
            label: None,
            backend: None,
            fields: Vec::new(),
            search_fields: Vec::new(),
            primary_key_field_name: None,
            properties: IndexMap::new(),
        }
    }

    pub fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| humanize(&self.name))
    }

    pub fn property(&self, name: &str) -> Option<&PropertyConfig> {
        self.properties.get(name)
    }

    /// Scalar, storage-backed properties, in declaration order, optionally restricted by `search_fields`.
    pub fn searchable_fields(&self) -> Vec<SearchableField> {
        self.properties
            .values()
            .filter(|p| !p.is_association() && !p.virtual_field)
            .filter(|p| self.search_fields.is_empty() || self.search_fields.contains(&p.field_name))
            .map(SearchableField::from)
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub entities: IndexMap<String, ModelEntry>,
    #[serde(default)]
    pub documents: IndexMap<String, ModelEntry>,
    #[serde(default)]
    pub list: ListConfig,
}

impl AdminConfig {
    /// Look up a model by name in either registry.
    pub fn model(&self, name: &str) -> Option<&ModelEntry> {
        self.entities.get(name).or_else(|| self.documents.get(name))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entities.values().chain(self.documents.values())
    }

    pub fn model_for_class(&self, class: &str) -> Option<&ModelEntry> {
        self.models().find(|m| m.class == class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AssociationDescriptor, Cardinality, FieldDescriptor};

    fn entry() -> ModelEntry {
        let mut entry = ModelEntry::new("ProductCategory", "App\\Entity\\ProductCategory");
        let id = FieldDescriptor {
            name: "id".into(),
            storage_type: "integer".into(),
            nullable: false,
            virtual_field: false,
            id: true,
        };
        let name = FieldDescriptor {
            name: "name".into(),
            storage_type: "string".into(),
            nullable: false,
            virtual_field: false,
            id: false,
        };
        let parent = AssociationDescriptor {
            name: "parent".into(),
            target_class: "App\\Entity\\ProductCategory".into(),
            cardinality: Cardinality::One,
            owning_side: true,
        };
        entry.properties.insert("id".into(), PropertyConfig::from_field(&id));
        entry.properties.insert("name".into(), PropertyConfig::from_field(&name));
        entry
            .properties
            .insert("parent".into(), PropertyConfig::from_association(&parent, Backend::Relational));
        entry
            .properties
            .insert("summary".into(), PropertyConfig::virtual_property("summary"));
        entry
    }

    #[test]
    fn searchable_fields_skip_associations_and_virtuals() {
        let names: Vec<_> = entry().searchable_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn search_fields_restrict_the_set() {
        let mut e = entry();
        e.search_fields = vec!["name".into()];
        let fields = e.searchable_fields();
        assert_eq!(fields, vec![SearchableField::new("name", "string")]);
    }

    #[test]
    fn label_defaults_to_humanized_name() {
        assert_eq!(entry().label(), "Product category");
    }
}
