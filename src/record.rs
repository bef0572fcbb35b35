//! Model instances moved through the facade: a class name plus property values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub class: String,
    pub fields: Map<String, Value>,
}

impl ModelRecord {
    pub fn new(class: impl Into<String>) -> Self {
        ModelRecord {
            class: class.into(),
            fields: Map::new(),
        }
    }

    pub fn from_fields(class: impl Into<String>, fields: Map<String, Value>) -> Self {
        ModelRecord {
            class: class.into(),
            fields,
        }
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(property.into(), value.into());
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.fields.get(property)
    }

    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        self.fields.insert(property.into(), value);
    }

    /// Identifier value, `None` when absent or null.
    pub fn id(&self, id_field: &str) -> Option<&Value> {
        self.fields.get(id_field).filter(|v| !v.is_null())
    }
}

/// Anything the facade can classify: a class name or a record.
pub trait ClassRef {
    fn class_name(&self) -> &str;
}

impl ClassRef for str {
    fn class_name(&self) -> &str {
        self
    }
}

impl ClassRef for String {
    fn class_name(&self) -> &str {
        self
    }
}

impl ClassRef for ModelRecord {
    fn class_name(&self) -> &str {
        &self.class
    }
}

/// Render an identifier value for messages: strings unquoted, everything else as JSON.
pub fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
