use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level schema file: one entry per collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub collections: HashMap<String, CollectionSchema>,
}

/// Field declarations for a single collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    #[serde(default)]
    pub fields: HashMap<String, FieldDefinition>,
    #[serde(default = "default_true")]
    pub additional_properties: bool,
    #[serde(default)]
    pub strict: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CollectionSchema {
    fn default() -> Self {
        CollectionSchema {
            fields: HashMap::new(),
            additional_properties: true,
            strict: false,
        }
    }
}

/// Definition of a single field in a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Field type enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Any,
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    List,
    Object,
}

impl CollectionSchema {
    /// Fields that declare a default value.
    pub fn defaults(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.fields
            .iter()
            .filter_map(|(name, def)| def.default.as_ref().map(|d| (name, d)))
    }

    /// Builder-style helper for declaring a defaulted field in code.
    pub fn with_default(
        mut self,
        field: &str,
        field_type: FieldType,
        default: serde_json::Value,
    ) -> Self {
        self.fields.insert(
            field.to_string(),
            FieldDefinition {
                field_type,
                default: Some(default),
                ..Default::default()
            },
        );
        self
    }
}
