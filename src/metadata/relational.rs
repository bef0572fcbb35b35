//! Relational mapper metadata: table/column mappings with bitmask association types.

use crate::case::default_storage_name;
use crate::error::ConfigError;
use crate::metadata::{AssociationDescriptor, Backend, Cardinality, ClassMetadataWrapper, FieldDescriptor, SchemaProvider};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const ONE_TO_ONE: u8 = 1;
pub const MANY_TO_ONE: u8 = 2;
pub const ONE_TO_MANY: u8 = 4;
pub const MANY_TO_MANY: u8 = 8;
pub const TO_ONE: u8 = ONE_TO_ONE | MANY_TO_ONE;
pub const TO_MANY: u8 = ONE_TO_MANY | MANY_TO_MANY;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentifierConfig {
    Single(String),
    Composite(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub field_name: String,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub id: bool,
}

impl ColumnMapping {
    pub fn column(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.field_name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinMapping {
    pub field_name: String,
    pub target_entity: String,
    /// Bitmask: ONE_TO_ONE, MANY_TO_ONE, ONE_TO_MANY or MANY_TO_MANY.
    #[serde(rename = "type")]
    pub type_: u8,
    #[serde(default)]
    pub mapped_by: Option<String>,
    #[serde(default)]
    pub inversed_by: Option<String>,
    /// FK column of an owning to-one side. Defaults to `<field>_id`.
    #[serde(default)]
    pub join_column: Option<String>,
}

impl JoinMapping {
    pub fn is_owning_side(&self) -> bool {
        self.mapped_by.is_none()
    }

    /// The local FK column, only for owning to-one associations.
    pub fn local_column(&self) -> Option<String> {
        if self.type_ & TO_ONE != 0 && self.is_owning_side() {
            Some(
                self.join_column
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", self.field_name)),
            )
        } else {
            None
        }
    }
}

/// Mapping declaration for one entity, as registered with the relational mapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityMapping {
    pub class: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    /// Explicit identifier; when absent the fields flagged `id` are used.
    #[serde(default)]
    pub identifier: Option<IdentifierConfig>,
    pub fields: Vec<ColumnMapping>,
    #[serde(default)]
    pub associations: Vec<JoinMapping>,
}

/// Native relational class metadata.
#[derive(Clone, Debug)]
pub struct EntityMetadata {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub identifier: Vec<String>,
    pub is_identifier_composite: bool,
    pub field_mappings: IndexMap<String, ColumnMapping>,
    pub association_mappings: IndexMap<String, JoinMapping>,
    /// Storage type per column, FK columns typed like the target identifier.
    pub column_types: HashMap<String, String>,
}

impl EntityMetadata {
    pub fn from_mapping(mapping: &EntityMapping, default_schema: &str) -> Self {
        let identifier = match &mapping.identifier {
            Some(IdentifierConfig::Single(s)) => vec![s.clone()],
            Some(IdentifierConfig::Composite(v)) => v.clone(),
            None => mapping
                .fields
                .iter()
                .filter(|f| f.id)
                .map(|f| f.field_name.clone())
                .collect(),
        };
        let field_mappings = mapping
            .fields
            .iter()
            .map(|f| {
                let mut f = f.clone();
                f.id = identifier.contains(&f.field_name);
                (f.field_name.clone(), f)
            })
            .collect();
        let association_mappings = mapping
            .associations
            .iter()
            .map(|a| (a.field_name.clone(), a.clone()))
            .collect();
        let column_types = mapping
            .fields
            .iter()
            .map(|f| (f.column().to_string(), f.type_.clone()))
            .collect();
        EntityMetadata {
            name: mapping.class.clone(),
            schema: mapping.schema.clone().unwrap_or_else(|| default_schema.to_string()),
            table: mapping
                .table
                .clone()
                .unwrap_or_else(|| default_storage_name(&mapping.class)),
            is_identifier_composite: identifier.len() > 1,
            identifier,
            field_mappings,
            association_mappings,
            column_types,
        }
    }

    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    pub fn identifier_type(&self) -> Option<&str> {
        self.identifier
            .first()
            .and_then(|id| self.field_mappings.get(id))
            .map(|f| f.type_.as_str())
    }

    /// Column backing a property: a field column or the FK column of an owning to-one association.
    pub fn column_for(&self, property: &str) -> Option<String> {
        if let Some(f) = self.field_mappings.get(property) {
            return Some(f.column().to_string());
        }
        self.association_mappings
            .get(property)
            .and_then(JoinMapping::local_column)
    }

    /// (column, property) pairs read back from a row, fields first then FK columns.
    pub fn selected_columns(&self) -> Vec<(String, String)> {
        let fields = self
            .field_mappings
            .values()
            .map(|f| (f.column().to_string(), f.field_name.clone()));
        let joins = self
            .association_mappings
            .values()
            .filter_map(|a| a.local_column().map(|c| (c, a.field_name.clone())));
        fields.chain(joins).collect()
    }

    /// Identifier column (first identifier component).
    pub fn identifier_column(&self) -> Option<String> {
        self.identifier.first().and_then(|id| self.column_for(id))
    }
}

/// Wraps [`EntityMetadata`] behind the unified contract.
#[derive(Clone, Debug)]
pub struct RelationalMetadataWrapper {
    metadata: Arc<EntityMetadata>,
}

impl RelationalMetadataWrapper {
    pub fn new(metadata: Arc<EntityMetadata>) -> Self {
        RelationalMetadataWrapper { metadata }
    }

    pub fn native(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// Translate a bitmask association type to its cardinality.
    pub fn cardinality_of(code: u8) -> Option<Cardinality> {
        if code & TO_MANY != 0 {
            Some(Cardinality::Many)
        } else if code & TO_ONE != 0 {
            Some(Cardinality::One)
        } else {
            None
        }
    }
}

impl ClassMetadataWrapper for RelationalMetadataWrapper {
    fn class_name(&self) -> &str {
        &self.metadata.name
    }

    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn single_identifier_field_name(&self) -> Result<String, ConfigError> {
        match self.metadata.identifier.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(ConfigError::MissingIdentifier {
                class: self.metadata.name.clone(),
            }),
            many => Err(ConfigError::CompositeKey {
                class: self.metadata.name.clone(),
                fields: many.to_vec(),
            }),
        }
    }

    fn is_identifier_composite(&self) -> bool {
        self.metadata.is_identifier_composite
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
                let cardinality = Self::cardinality_of(a.type_).ok_or_else(|| ConfigError::UnknownCardinality {
                    class: self.metadata.name.clone(),
                    field: a.field_name.clone(),
                    code: a.type_.to_string(),
                })?;
                Ok((
                    a.field_name.clone(),
                    AssociationDescriptor {
                        name: a.field_name.clone(),
                        target_class: a.target_entity.clone(),
                        cardinality,
                        owning_side: a.is_owning_side(),
                    },
                ))
            })
            .collect()
    }
}

/// Schema registry of the relational mapper.
#[derive(Clone, Debug, Default)]
pub struct RelationalSchemaProvider {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl RelationalSchemaProvider {
    /// Build from mapping declarations. Association targets must be registered entities and
    /// identifier components must be declared fields.
    pub fn new(mappings: &[EntityMapping], default_schema: &str) -> Result<Self, ConfigError> {
        let mut metadata: HashMap<String, EntityMetadata> = HashMap::new();
        for mapping in mappings {
            let meta = EntityMetadata::from_mapping(mapping, default_schema);
            for id in &meta.identifier {
                if !meta.field_mappings.contains_key(id) {
                    return Err(ConfigError::MissingReference {
                        kind: "identifier field",
                        id: format!("{}.{}", meta.name, id),
                    });
                }
            }
            metadata.insert(meta.name.clone(), meta);
        }

        let mut fk_types: Vec<(String, String, String)> = Vec::new();
        for meta in metadata.values() {
            for assoc in meta.association_mappings.values() {
                let target = metadata.get(&assoc.target_entity).ok_or_else(|| ConfigError::MissingReference {
                    kind: "target entity",
                    id: assoc.target_entity.clone(),
                })?;
                if let (Some(column), Some(ty)) = (assoc.local_column(), target.identifier_type()) {
                    fk_types.push((meta.name.clone(), column, ty.to_string()));
                }
            }
        }
        for (class, column, ty) in fk_types {
            if let Some(meta) = metadata.get_mut(&class) {
                meta.column_types.entry(column).or_insert(ty);
            }
        }

        tracing::debug!(count = metadata.len(), "relational mappings registered");
        let entities = metadata.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        Ok(RelationalSchemaProvider { entities })
    }

    pub fn entity(&self, class: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(class).cloned()
    }
}

impl SchemaProvider for RelationalSchemaProvider {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn metadata_for(&self, class: &str) -> Option<Arc<dyn ClassMetadataWrapper>> {
        self.entity(class)
            .map(|m| Arc::new(RelationalMetadataWrapper::new(m)) as Arc<dyn ClassMetadataWrapper>)
    }

    fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.entities.keys().cloned().collect();
        classes.sort();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category_mapping() -> EntityMapping {
        serde_json::from_value(serde_json::json!({
            "class": "App\\Entity\\Category",
            "fields": [
                { "field_name": "id", "type": "integer", "id": true },
                { "field_name": "name", "type": "string" }
            ],
            "associations": [
                { "field_name": "parent", "target_entity": "App\\Entity\\Category", "type": MANY_TO_ONE },
                { "field_name": "children", "target_entity": "App\\Entity\\Category", "type": ONE_TO_MANY, "mapped_by": "parent" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn bitmask_cardinality_translation() {
        assert_eq!(RelationalMetadataWrapper::cardinality_of(ONE_TO_ONE), Some(Cardinality::One));
        assert_eq!(RelationalMetadataWrapper::cardinality_of(MANY_TO_ONE), Some(Cardinality::One));
        assert_eq!(RelationalMetadataWrapper::cardinality_of(ONE_TO_MANY), Some(Cardinality::Many));
        assert_eq!(RelationalMetadataWrapper::cardinality_of(MANY_TO_MANY), Some(Cardinality::Many));
        assert_eq!(RelationalMetadataWrapper::cardinality_of(0), None);
    }

    #[test]
    fn defaults_table_schema_and_join_columns() {
        let provider = RelationalSchemaProvider::new(&[category_mapping()], "public").unwrap();
        let meta = provider.entity("App\\Entity\\Category").unwrap();
        assert_eq!(meta.table, "category");
        assert_eq!(meta.schema, "public");
        assert_eq!(meta.column_for("parent").as_deref(), Some("parent_id"));
        assert_eq!(meta.column_for("children"), None);
        assert_eq!(meta.identifier_column().as_deref(), Some("id"));
        assert_eq!(meta.column_type("parent_id"), Some("integer"));
    }

    #[test]
    fn composite_identifier_is_rejected_by_wrapper() {
        let mut mapping = category_mapping();
        mapping.identifier = Some(IdentifierConfig::Composite(vec!["id".into(), "name".into()]));
        let provider = RelationalSchemaProvider::new(&[mapping], "public").unwrap();
        let wrapper = provider.metadata_for("App\\Entity\\Category").unwrap();
        assert!(wrapper.is_identifier_composite());
        assert!(matches!(
            wrapper.single_identifier_field_name(),
            Err(ConfigError::CompositeKey { .. })
        ));
    }

    #[test]
    fn unknown_target_entity_fails() {
        let mut mapping = category_mapping();
        mapping.associations[0].target_entity = "App\\Entity\\Missing".into();
        assert!(matches!(
            RelationalSchemaProvider::new(&[mapping], "public"),
            Err(ConfigError::MissingReference { .. })
        ));
    }
}
