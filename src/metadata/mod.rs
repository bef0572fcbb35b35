//! Backend-agnostic view over the schema metadata of managed classes.
//!
//! Each persistence backend reports its schema through its own native types (bitmask
//! cardinalities and identifier lists on the relational side, symbolic cardinalities and
//! per-field identifier flags on the document side). The wrappers in this module are the
//! only place that understands those encodings; everything downstream works with
//! [`FieldDescriptor`], [`AssociationDescriptor`] and [`Cardinality`].

pub mod document;
pub mod provider;
pub mod relational;

pub use document::{DocumentMapping, DocumentMetadata, DocumentMetadataWrapper, DocumentSchemaProvider};
pub use provider::SchemaProvider;
pub use relational::{EntityMapping, EntityMetadata, RelationalMetadataWrapper, RelationalSchemaProvider};

use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persistence family owning a model class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Relational,
    Document,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Relational => "relational",
            Backend::Document => "document",
        }
    }

    /// Property type tag given to association fields of this backend.
    pub fn association_type_tag(&self) -> &'static str {
        match self {
            Backend::Relational => "association",
            Backend::Document => "association_odm",
        }
    }

    /// Namespace convention: classes living under an `Entity` namespace segment are
    /// relational, everything else is a document.
    pub fn from_namespace(class: &str) -> Backend {
        let is_entity = class
            .split(|c| c == '\\' || c == ':')
            .filter(|s| !s.is_empty())
            .rev()
            .skip(1)
            .any(|segment| segment.eq_ignore_ascii_case("entity"));
        if is_entity {
            Backend::Relational
        } else {
            Backend::Document
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an association resolves to one related record or many.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cardinality {
    One,
    Many,
}

/// Scalar or embedded field of a managed class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub storage_type: String,
    #[serde(default)]
    pub nullable: bool,
    /// Not backed by storage; only known to the admin configuration.
    #[serde(default, rename = "virtual")]
    pub virtual_field: bool,
    #[serde(default)]
    pub id: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    pub name: String,
    pub target_class: String,
    pub cardinality: Cardinality,
    pub owning_side: bool,
}

/// Unified metadata contract consumed by the introspector, the facade and the query factory.
pub trait ClassMetadataWrapper: Send + Sync + fmt::Debug {
    fn class_name(&self) -> &str;

    /// Backend family that produced this metadata.
    fn backend(&self) -> Backend;

    fn single_identifier_field_name(&self) -> Result<String, ConfigError>;

    fn is_identifier_composite(&self) -> bool;

    /// Declared fields in declaration order.
    fn field_mappings(&self) -> IndexMap<String, FieldDescriptor>;

    /// Associations with their cardinality already translated.
    fn association_mappings(&self) -> Result<IndexMap<String, AssociationDescriptor>, ConfigError>;

    fn has_field(&self, name: &str) -> bool {
        self.field_mappings().contains_key(name)
    }
}
