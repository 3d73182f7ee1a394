mod parser;
mod registry;
mod types;

pub use parser::{parse_collection_schema_str, parse_schema, parse_schema_str};
pub use registry::SchemaRegistry;
pub use types::{CollectionSchema, FieldDefinition, FieldType, SchemaDefinition};
