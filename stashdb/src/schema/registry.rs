use super::types::{CollectionSchema, SchemaDefinition};
use std::collections::HashMap;

/// Per-connector mapping from collection name to its schema.
/// Schemas are registered or replaced, never removed.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, CollectionSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any prior one for the collection.
    pub fn register(&mut self, collection: &str, schema: CollectionSchema) {
        log::debug!("Registering schema for collection '{collection}'");
        self.schemas.insert(collection.to_string(), schema);
    }

    /// Register every collection of a parsed schema file.
    pub fn register_all(&mut self, definition: &SchemaDefinition) {
        for (name, schema) in &definition.collections {
            self.register(name, schema.clone());
        }
    }

    pub fn get(&self, collection: &str) -> Option<&CollectionSchema> {
        self.schemas.get(collection)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CollectionSchema)> {
        self.schemas.iter()
    }
}
