// Documents, identity and timestamp generation

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored record: an arbitrary field map with reserved `id`, `createdAt`
/// and `updatedAt` fields.
pub type Document = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// How new document ids are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Time-ordered, lowercase ULID.
    #[default]
    Ulid,
    Uuid,
    Nanoid,
}

/// Produce a fresh id using the given strategy.
pub fn new_id(strategy: IdStrategy) -> String {
    match strategy {
        IdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
        IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
        IdStrategy::Nanoid => nanoid::nanoid!(),
    }
}

/// Current time as ISO-8601 with millisecond precision, e.g.
/// `2024-05-01T09:30:00.123Z`.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The document's id as a string. Numeric ids are accepted and stringified.
pub fn doc_id(doc: &Document) -> Option<String> {
    match doc.get(ID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether the document's id equals `id`.
pub fn has_id(doc: &Document, id: &str) -> bool {
    doc.get(ID_FIELD)
        .map(|v| crate::address::value_matches_str(v, id))
        .unwrap_or(false)
}

/// Fill in `id`, `createdAt` and `updatedAt` where they are missing.
/// Present values are kept verbatim.
pub fn ensure_identity(doc: &mut Document, strategy: IdStrategy) {
    if doc_id(doc).is_none() {
        doc.insert(ID_FIELD.into(), Value::String(new_id(strategy)));
    }
    let stamp = now();
    if !doc.contains_key(CREATED_AT_FIELD) {
        doc.insert(CREATED_AT_FIELD.into(), Value::String(stamp.clone()));
    }
    if !doc.contains_key(UPDATED_AT_FIELD) {
        doc.insert(UPDATED_AT_FIELD.into(), Value::String(stamp));
    }
}

/// Interpret a JSON value as a document. Non-objects are rejected.
pub fn from_value(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
