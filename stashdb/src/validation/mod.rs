use crate::document::{Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::schema::{CollectionSchema, FieldDefinition, FieldType};
use serde_json::Value;

/// Result of validating a document
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Fill in declared defaults for fields absent from the document.
///
/// Only missing keys are filled: `0`, `false`, `""` and explicit `null` are
/// all present values and are left alone.
pub fn apply_defaults(schema: &CollectionSchema, doc: &mut Document) {
    for (field_name, default) in schema.defaults() {
        if !doc.contains_key(field_name) {
            doc.insert(field_name.clone(), default.clone());
        }
    }
}

/// Like [`apply_defaults`], but for an optional schema.
pub fn with_defaults(schema: Option<&CollectionSchema>, mut doc: Document) -> Document {
    if let Some(schema) = schema {
        apply_defaults(schema, &mut doc);
    }
    doc
}

/// Check a document against its collection schema.
///
/// The store never enforces this; it backs the CLI `validate` report and is
/// available to callers that validate before writing. In strict mode issues
/// are errors, otherwise warnings.
pub fn validate_document(schema: &CollectionSchema, doc: &Document) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (field_name, field_def) in &schema.fields {
        let value = doc.get(field_name);

        if field_def.required && matches!(value, None | Some(Value::Null)) {
            if field_def.default.is_none() {
                add_issue(
                    &mut result,
                    schema.strict,
                    format!("Required field '{field_name}' is missing"),
                );
            }
            continue;
        }

        if let Some(val) = value {
            if !val.is_null() {
                validate_field_value(field_name, field_def, val, schema.strict, &mut result);
            }
        }
    }

    if !schema.additional_properties {
        for key in doc.keys() {
            let reserved = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD].contains(&key.as_str());
            if !reserved && !schema.fields.contains_key(key) {
                add_issue(
                    &mut result,
                    schema.strict,
                    format!("Unexpected field '{key}' (additional_properties is false)"),
                );
            }
        }
    }

    result
}

fn validate_field_value(
    field_name: &str,
    field_def: &FieldDefinition,
    value: &Value,
    strict: bool,
    result: &mut ValidationResult,
) {
    let expected = match field_def.field_type {
        FieldType::Any => None,
        FieldType::String if !value.is_string() => Some("string"),
        FieldType::Number if !value.is_number() => Some("number"),
        FieldType::Boolean if !value.is_boolean() => Some("boolean"),
        FieldType::Date | FieldType::Datetime if !value.is_string() => Some("date string"),
        FieldType::List if !value.is_array() => Some("list"),
        FieldType::Object if !value.is_object() => Some("object"),
        _ => None,
    };

    if let Some(expected) = expected {
        add_issue(
            result,
            strict,
            format!("Field '{field_name}' expected {expected}, got {}", type_name(value)),
        );
        return;
    }

    if let Some(enum_values) = &field_def.enum_values {
        if !enum_values.contains(value) {
            add_issue(
                result,
                strict,
                format!("Field '{field_name}' value {value} is not in enum: {enum_values:?}"),
            );
        }
    }
}

fn add_issue(result: &mut ValidationResult, strict: bool, message: String) {
    if strict {
        result.errors.push(message);
    } else {
        result.warnings.push(message);
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_schema_str, SchemaDefinition};
    use serde_json::json;

    fn test_schema() -> SchemaDefinition {
        parse_schema_str(
            r#"
collections:
  users:
    fields:
      name: { type: string, required: true }
      email: { type: string, required: true }
      role: { type: string, enum: [admin, member, guest], default: member }
      active: { type: boolean, default: true }
      score: { type: number, default: 10 }
    additional_properties: false
    strict: true

  events:
    fields:
      type: { type: string, required: true }
      payload: { type: object }
      tags: { type: list, default: [] }
"#,
        )
        .unwrap()
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_apply_defaults() {
        let schema = test_schema();
        let mut data = doc(json!({ "name": "Alice", "email": "alice@test.com" }));

        apply_defaults(&schema.collections["users"], &mut data);
        assert_eq!(data["role"], "member");
        assert_eq!(data["active"], true);
        assert_eq!(data["score"], 10);
    }

    #[test]
    fn test_apply_defaults_keeps_falsy_values() {
        let schema = test_schema();
        let mut data = doc(json!({
            "name": "",
            "role": "",
            "active": false,
            "score": 0
        }));

        apply_defaults(&schema.collections["users"], &mut data);
        assert_eq!(data["role"], "");
        assert_eq!(data["active"], false);
        assert_eq!(data["score"], 0);
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_null() {
        let schema = test_schema();
        let mut data = doc(json!({ "role": null }));
        apply_defaults(&schema.collections["users"], &mut data);
        assert_eq!(data["role"], Value::Null);
    }

    #[test]
    fn test_with_defaults_without_schema() {
        let data = with_defaults(None, doc(json!({ "a": 1 })));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_valid_user() {
        let schema = test_schema();
        let data = doc(json!({
            "id": "u1",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "name": "Alice",
            "email": "alice@test.com",
            "role": "admin"
        }));

        let result = validate_document(&schema.collections["users"], &data);
        assert!(result.is_ok(), "Errors: {:?}", result.errors);
    }

    #[test]
    fn test_missing_required_field() {
        let schema = test_schema();
        let data = doc(json!({ "name": "Alice" }));

        let result = validate_document(&schema.collections["users"], &data);
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("email")));
    }

    #[test]
    fn test_invalid_enum_value() {
        let schema = test_schema();
        let data = doc(json!({ "name": "Alice", "email": "a@b.c", "role": "superadmin" }));

        let result = validate_document(&schema.collections["users"], &data);
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("superadmin")));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = test_schema();
        let data = doc(json!({ "name": 42, "email": "a@b.c" }));

        let result = validate_document(&schema.collections["users"], &data);
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("name")));
    }

    #[test]
    fn test_additional_properties_rejected() {
        let schema = test_schema();
        let data = doc(json!({ "name": "Alice", "email": "a@b.c", "extra_field": "oops" }));

        let result = validate_document(&schema.collections["users"], &data);
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("extra_field")));
    }

    #[test]
    fn test_non_strict_mode_warnings() {
        let schema = test_schema();
        let data = doc(json!({ "type": 123, "extra": "data", "tags": "nope" }));

        let result = validate_document(&schema.collections["events"], &data);
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 2);
    }
}
