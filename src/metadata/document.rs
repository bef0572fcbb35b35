//! Document mapper metadata: collections whose identifier is a flagged field and whose
//! references carry a symbolic cardinality.

use crate::case::default_storage_name;
use crate::error::ConfigError;
use crate::metadata::{AssociationDescriptor, Backend, Cardinality, ClassMetadataWrapper, FieldDescriptor, SchemaProvider};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const ONE: &str = "one";
pub const MANY: &str = "many";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentFieldMapping {
    pub field_name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub id: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMapping {
    pub field_name: String,
    pub target_document: String,
    /// `one` or `many`.
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub mapped_by: Option<String>,
}

impl ReferenceMapping {
    pub fn is_owning_side(&self) -> bool {
        self.mapped_by.is_none()
    }
}

/// Mapping declaration for one document class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentMapping {
    pub class: String,
    #[serde(default)]
    pub collection: Option<String>,
    pub fields: Vec<DocumentFieldMapping>,
    #[serde(default)]
    pub associations: Vec<ReferenceMapping>,
}

/// Native document class metadata.
#[derive(Clone, Debug)]
pub struct DocumentMetadata {
    pub name: String,
    pub collection: String,
    pub field_mappings: IndexMap<String, DocumentFieldMapping>,
    pub association_mappings: IndexMap<String, ReferenceMapping>,
}

impl DocumentMetadata {
    pub fn from_mapping(mapping: &DocumentMapping) -> Self {
        DocumentMetadata {
            name: mapping.class.clone(),
            collection: mapping
                .collection
                .clone()
                .unwrap_or_else(|| default_storage_name(&mapping.class)),
            field_mappings: mapping
                .fields
                .iter()
                .map(|f| (f.field_name.clone(), f.clone()))
                .collect(),
            association_mappings: mapping
                .associations
                .iter()
                .map(|a| (a.field_name.clone(), a.clone()))
                .collect(),
        }
    }

    pub fn identifier_field(&self) -> Option<&str> {
        self.field_mappings
            .values()
            .find(|f| f.id)
            .map(|f| f.field_name.as_str())
    }

    /// Properties stored in a document: fields and single references.
    pub fn is_stored_property(&self, property: &str) -> bool {
        self.field_mappings.contains_key(property)
            || self
                .association_mappings
                .get(property)
                .is_some_and(|a| a.type_ == ONE)
    }
}

/// Wraps [`DocumentMetadata`] behind the unified contract.
#[derive(Clone, Debug)]
pub struct DocumentMetadataWrapper {
    metadata: Arc<DocumentMetadata>,
}

impl DocumentMetadataWrapper {
    pub fn new(metadata: Arc<DocumentMetadata>) -> Self {
        DocumentMetadataWrapper { metadata }
    }

    pub fn native(&self) -> &Arc<DocumentMetadata> {
        &self.metadata
    }

    /// Translate a symbolic reference type to its cardinality.
    pub fn cardinality_of(kind: &str) -> Option<Cardinality> {
        match kind {
            MANY => Some(Cardinality::Many),
            ONE => Some(Cardinality::One),
            _ => None,
        }
    }
}

impl ClassMetadataWrapper for DocumentMetadataWrapper {
    fn class_name(&self) -> &str {
        &self.metadata.name
    }

    fn backend(&self) -> Backend {
        Backend::Document
    }

    fn single_identifier_field_name(&self) -> Result<String, ConfigError> {
        self.metadata
            .identifier_field()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingIdentifier {
                class: self.metadata.name.clone(),
            })
    }

    fn is_identifier_composite(&self) -> bool {
        false
    }

    fn field_mappings(&self) -> IndexMap<String, FieldDescriptor> {
        self.metadata
            .field_mappings
            .values()
            .map(|f| {
                (
                    f.field_name.clone(),
                    FieldDescriptor {
                        name: f.field_name.clone(),
                        storage_type: f.type_.clone(),
                        nullable: f.nullable,
                        virtual_field: false,
                        id: f.id,
                    },
                )
            })
            .collect()
    }

    fn association_mappings(&self) -> Result<IndexMap<String, AssociationDescriptor>, ConfigError> {
        self.metadata
            .association_mappings
            .values()
            .map(|a| {
                let cardinality = Self::cardinality_of(&a.type_).ok_or_else(|| ConfigError::UnknownCardinality {
                    class: self.metadata.name.clone(),
                    field: a.field_name.clone(),
                    code: a.type_.clone(),
                })?;
                Ok((
                    a.field_name.clone(),
                    AssociationDescriptor {
                        name: a.field_name.clone(),
                        target_class: a.target_document.clone(),
                        cardinality,
                        owning_side: a.is_owning_side(),
                    },
                ))
            })
            .collect()
    }
}

/// Schema registry of the document mapper.
#[derive(Clone, Debug, Default)]
pub struct DocumentSchemaProvider {
    documents: HashMap<String, Arc<DocumentMetadata>>,
}

impl DocumentSchemaProvider {
    pub fn new(mappings: &[DocumentMapping]) -> Self {
        let documents: HashMap<_, _> = mappings
            .iter()
            .map(|m| (m.class.clone(), Arc::new(DocumentMetadata::from_mapping(m))))
            .collect();
        tracing::debug!(count = documents.len(), "document mappings registered");
        DocumentSchemaProvider { documents }
    }

    pub fn document(&self, class: &str) -> Option<Arc<DocumentMetadata>> {
        self.documents.get(class).cloned()
    }
}

impl SchemaProvider for DocumentSchemaProvider {
    fn backend(&self) -> Backend {
        Backend::Document
    }

    fn metadata_for(&self, class: &str) -> Option<Arc<dyn ClassMetadataWrapper>> {
        self.document(class)
            .map(|m| Arc::new(DocumentMetadataWrapper::new(m)) as Arc<dyn ClassMetadataWrapper>)
    }

    fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.documents.keys().cloned().collect();
        classes.sort();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_mapping(with_id: bool) -> DocumentMapping {
        serde_json::from_value(serde_json::json!({
            "class": "App\\Document\\Product",
            "fields": [
                { "field_name": "sku", "type": "string", "id": with_id },
                { "field_name": "title", "type": "string" },
                { "field_name": "price", "type": "float" }
            ],
            "associations": [
                { "field_name": "tags", "target_document": "App\\Document\\Tag", "type": "many", "embedded": true },
                { "field_name": "brand", "target_document": "App\\Document\\Brand", "type": "one" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn identifier_is_the_flagged_field() {
        let provider = DocumentSchemaProvider::new(&[product_mapping(true)]);
        let wrapper = provider.metadata_for("App\\Document\\Product").unwrap();
        assert_eq!(wrapper.single_identifier_field_name().unwrap(), "sku");
        assert!(!wrapper.is_identifier_composite());
        assert_eq!(provider.document("App\\Document\\Product").unwrap().collection, "product");
    }

    #[test]
    fn missing_identifier_flag_fails() {
        let provider = DocumentSchemaProvider::new(&[product_mapping(false)]);
        let wrapper = provider.metadata_for("App\\Document\\Product").unwrap();
        assert!(matches!(
            wrapper.single_identifier_field_name(),
            Err(ConfigError::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn symbolic_cardinality_translation() {
        let provider = DocumentSchemaProvider::new(&[product_mapping(true)]);
        let wrapper = provider.metadata_for("App\\Document\\Product").unwrap();
        let assoc = wrapper.association_mappings().unwrap();
        assert_eq!(assoc["tags"].cardinality, Cardinality::Many);
        assert_eq!(assoc["brand"].cardinality, Cardinality::One);
        assert_eq!(DocumentMetadataWrapper::cardinality_of("several"), None);
    }

    #[test]
    fn field_order_follows_declaration() {
        let provider = DocumentSchemaProvider::new(&[product_mapping(true)]);
        let wrapper = provider.metadata_for("App\\Document\\Product").unwrap();
        let names: Vec<_> = wrapper.field_mappings().keys().cloned().collect();
        assert_eq!(names, vec!["sku", "title", "price"]);
    }
}
