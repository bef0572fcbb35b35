//! Enriched per-property configuration produced by introspection and consumed by rendering.

use crate::metadata::{AssociationDescriptor, Backend, Cardinality, FieldDescriptor};
use serde::{Deserialize, Serialize};

/// Field storage types compared by exact numeric equality in searches.
pub const NUMERIC_TYPES: &[&str] = &["integer", "number", "smallint", "bigint", "decimal", "float"];

/// Field storage types compared by case-insensitive substring in searches.
pub const TEXT_TYPES: &[&str] = &["string", "text", "guid"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyConfig {
    pub field_name: String,
    /// Storage type, or `association` / `association_odm` for relations.
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_side: Option<bool>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub id: bool,
    #[serde(default, rename = "virtual")]
    pub virtual_field: bool,
    /// Unset means sortable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
}

impl PropertyConfig {
    pub fn from_field(field: &FieldDescriptor) -> Self {
        PropertyConfig {
            field_name: field.name.clone(),
            type_: field.storage_type.clone(),
            association_type: None,
            target_class: None,
            owning_side: None,
            nullable: field.nullable,
            id: field.id,
            virtual_field: field.virtual_field,
            sortable: None,
        }
    }

    pub fn from_association(assoc: &AssociationDescriptor, backend: Backend) -> Self {
        PropertyConfig {
            field_name: assoc.name.clone(),
            type_: backend.association_type_tag().to_string(),
            association_type: Some(assoc.cardinality),
            target_class: Some(assoc.target_class.clone()),
            owning_side: Some(assoc.owning_side),
            nullable: true,
            id: false,
            virtual_field: false,
            // a to-many relation has no single comparable value to order rows by
            sortable: match assoc.cardinality {
                Cardinality::Many => Some(false),
                Cardinality::One => None,
            },
        }
    }

    /// A property the admin configuration declares but the storage does not know about.
    pub fn virtual_property(name: &str) -> Self {
        PropertyConfig {
            field_name: name.to_string(),
            type_: "text".into(),
            association_type: None,
            target_class: None,
            owning_side: None,
            nullable: true,
            id: false,
            virtual_field: true,
            sortable: Some(false),
        }
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable.unwrap_or(true)
    }

    pub fn is_association(&self) -> bool {
        self.association_type.is_some()
    }

    pub fn is_numeric(&self) -> bool {
        NUMERIC_TYPES.contains(&self.type_.as_str())
    }

    pub fn is_text(&self) -> bool {
        TEXT_TYPES.contains(&self.type_.as_str())
    }
}

/// Field eligible for free-text search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchableField {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub id: bool,
}

impl SearchableField {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        SearchableField {
            name: name.into(),
            data_type: data_type.into(),
            id: false,
        }
    }

    pub fn identifier(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        SearchableField {
            id: true,
            ..SearchableField::new(name, data_type)
        }
    }

    pub fn is_numeric(&self) -> bool {
        NUMERIC_TYPES.contains(&self.data_type.as_str())
    }

    pub fn is_text(&self) -> bool {
        TEXT_TYPES.contains(&self.data_type.as_str())
    }
}

impl From<&PropertyConfig> for SearchableField {
    fn from(p: &PropertyConfig) -> Self {
        SearchableField {
            name: p.field_name.clone(),
            data_type: p.type_.clone(),
            id: p.id,
        }
    }
}
