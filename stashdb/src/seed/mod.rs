//! Declarative seed data and the policies for merging it into stored data.

use crate::address::Address;
use crate::document::{self, Document, IdStrategy};
use crate::error::Result;
use crate::query::{self, ListParams};
use crate::response::Response;
use crate::storage::Blob;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// How seed items interact with a collection that already has documents.
/// An empty or missing collection always receives the seed items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Stored collection becomes exactly the seed items.
    Replace,
    /// Seed items are appended after the stored ones.
    Append,
    /// Seed items are only used when the stored collection is empty.
    #[default]
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedBehavior {
    #[serde(default = "default_true")]
    pub initialize_empty: bool,
    #[serde(default)]
    pub use_on_no_content: bool,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

impl Default for SeedBehavior {
    fn default() -> Self {
        SeedBehavior {
            initialize_empty: true,
            use_on_no_content: false,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Initial data plus the policy for applying it. Read once when a connector
/// is built and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedDescriptor {
    #[serde(default)]
    pub data: BTreeMap<String, Vec<Document>>,
    #[serde(default)]
    pub behavior: SeedBehavior,
}

impl SeedDescriptor {
    pub fn new(behavior: SeedBehavior) -> Self {
        SeedDescriptor {
            data: BTreeMap::new(),
            behavior,
        }
    }

    /// Add seed items for a collection. Non-object values are skipped.
    pub fn with_collection(mut self, collection: &str, items: Vec<Value>) -> Self {
        let docs = items.into_iter().filter_map(document::from_value).collect();
        self.data.insert(collection.to_string(), docs);
        self
    }

    /// Load a seed descriptor from a YAML or JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parse a seed descriptor from YAML or JSON text.
    pub fn parse_str(content: &str) -> Result<Self> {
        let seed: SeedDescriptor = serde_yaml::from_str(content)?;
        Ok(seed)
    }

    /// Merge the seed into `blob` according to the behavior.
    /// Returns the names of collections that changed.
    pub fn apply(&self, blob: &mut Blob, ids: IdStrategy) -> Vec<String> {
        let mut changed = Vec::new();
        if !self.behavior.initialize_empty {
            log::debug!("Seeding disabled (initializeEmpty = false)");
            return changed;
        }

        for (collection, items) in &self.data {
            let existing = blob.entry(collection.clone()).or_default();
            let strategy = self.behavior.merge_strategy;

            if existing.is_empty() || strategy == MergeStrategy::Replace {
                *existing = prepare(items, ids);
            } else if strategy == MergeStrategy::Append {
                existing.extend(prepare(items, ids));
            } else {
                log::debug!(
                    "Seed for '{collection}' skipped: {} stored documents kept",
                    existing.len()
                );
                continue;
            }

            log::info!(
                "Seeded '{collection}' with {} items ({strategy:?}), now {} documents",
                items.len(),
                existing.len()
            );
            changed.push(collection.clone());
        }

        changed
    }

    /// Substitute seed data for an empty remote result.
    ///
    /// Returns `None` when `useOnNoContent` is off or the seed has nothing for
    /// the address. Item reads match by id; list reads are parent-scoped,
    /// filtered and paginated like a stored collection.
    pub fn fallback(&self, address: &Address, params: &ListParams) -> Option<Response<Value>> {
        if !self.behavior.use_on_no_content {
            return None;
        }
        let items = self.data.get(&address.collection)?;
        let scoped = items
            .iter()
            .filter(|doc| address.matches_parents(doc))
            .cloned();

        match &address.id {
            Some(id) => scoped
                .into_iter()
                .find(|doc| document::has_id(doc, id))
                .map(|doc| Response::ok(Value::Object(doc)).with_message("Served from seed data")),
            None => {
                let (page, meta) = query::paginate(scoped.collect(), params);
                let data = page.into_iter().map(Value::Object).collect();
                Some(Response::page(Value::Array(data), meta).with_message("Served from seed data"))
            }
        }
    }
}

fn prepare(items: &[Document], ids: IdStrategy) -> Vec<Document> {
    items
        .iter()
        .cloned()
        .map(|mut doc| {
            document::ensure_identity(&mut doc, ids);
            doc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::resolve;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn stored(texts: &[&str]) -> Vec<Document> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                json!({ "id": format!("old{i}"), "text": t })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect()
    }

    fn seed(strategy: MergeStrategy) -> SeedDescriptor {
        SeedDescriptor::new(SeedBehavior {
            merge_strategy: strategy,
            ..Default::default()
        })
        .with_collection(
            "todos",
            vec![json!({ "text": "s1" }), json!({ "id": "fixed", "text": "s2" })],
        )
    }

    #[test]
    fn test_empty_collection_always_seeded() {
        for strategy in [MergeStrategy::Replace, MergeStrategy::Append, MergeStrategy::Merge] {
            let mut blob = Blob::new();
            let changed = seed(strategy).apply(&mut blob, IdStrategy::Ulid);
            assert_eq!(changed, vec!["todos".to_string()]);
            assert_eq!(blob["todos"].len(), 2);
        }
    }

    #[test]
    fn test_replace() {
        let mut blob = Blob::new();
        blob.insert("todos".into(), stored(&["a", "b", "c"]));
        seed(MergeStrategy::Replace).apply(&mut blob, IdStrategy::Ulid);

        let todos = &blob["todos"];
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0]["text"], "s1");
        assert!(document::doc_id(&todos[0]).is_some());
        assert!(todos[0]["createdAt"].is_string());
        assert_eq!(todos[1]["id"], "fixed");
    }

    #[test]
    fn test_append() {
        let mut blob = Blob::new();
        blob.insert("todos".into(), stored(&["a", "b"]));
        seed(MergeStrategy::Append).apply(&mut blob, IdStrategy::Ulid);

        let todos = &blob["todos"];
        assert_eq!(todos.len(), 4);
        assert_eq!(todos[0]["text"], "a");
        assert_eq!(todos[3]["id"], "fixed");
    }

    #[test]
    fn test_merge_leaves_non_empty_untouched() {
        let mut blob = Blob::new();
        blob.insert("todos".into(), stored(&["a"]));
        let before = blob.clone();
        let changed = seed(MergeStrategy::Merge).apply(&mut blob, IdStrategy::Ulid);
        assert!(changed.is_empty());
        assert_eq!(blob, before);
    }

    #[test]
    fn test_initialize_empty_false_disables() {
        let mut descriptor = seed(MergeStrategy::Replace);
        descriptor.behavior.initialize_empty = false;
        let mut blob = Blob::new();
        assert!(descriptor.apply(&mut blob, IdStrategy::Ulid).is_empty());
        assert!(blob.is_empty());
    }

    #[test]
    fn test_parse_seed() {
        let yaml = r#"
data:
  todos:
    - { text: a }
    - { id: "2", text: b }
behavior:
  initializeEmpty: true
  useOnNoContent: true
  mergeStrategy: append
"#;
        let descriptor = SeedDescriptor::parse_str(yaml).unwrap();
        assert_eq!(descriptor.data["todos"].len(), 2);
        assert!(descriptor.behavior.use_on_no_content);
        assert_eq!(descriptor.behavior.merge_strategy, MergeStrategy::Append);

        let json = r#"{"data":{"notes":[]},"behavior":{"mergeStrategy":"replace"}}"#;
        let descriptor = SeedDescriptor::parse_str(json).unwrap();
        assert!(descriptor.behavior.initialize_empty);
        assert!(!descriptor.behavior.use_on_no_content);
        assert_eq!(descriptor.behavior.merge_strategy, MergeStrategy::Replace);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = SeedDescriptor::parse_str("behavior: { mergeStrategy: upsert }");
        assert!(err.is_err());
    }

    #[test]
    fn test_fallback_disabled() {
        let descriptor = seed(MergeStrategy::Merge);
        assert!(descriptor
            .fallback(&resolve("todos"), &ListParams::new())
            .is_none());
    }

    #[test]
    fn test_fallback_item_and_list() {
        let mut descriptor = seed(MergeStrategy::Merge);
        descriptor.behavior.use_on_no_content = true;

        let item = descriptor
            .fallback(&resolve("todos/fixed"), &ListParams::new())
            .unwrap();
        assert_eq!(item.data().unwrap()["text"], "s2");

        assert!(descriptor
            .fallback(&resolve("todos/absent"), &ListParams::new())
            .is_none());

        let list = descriptor
            .fallback(&resolve("todos"), &ListParams::new().limit(1))
            .unwrap();
        assert_eq!(list.data().unwrap().as_array().unwrap().len(), 1);
        assert_eq!(list.meta().unwrap().total, 2);
        assert_eq!(list.code(), None::<ErrorCode>);

        assert!(descriptor
            .fallback(&resolve("users"), &ListParams::new())
            .is_none());
    }

    #[test]
    fn test_fallback_respects_parent_scope() {
        let descriptor = SeedDescriptor::new(SeedBehavior {
            use_on_no_content: true,
            ..Default::default()
        })
        .with_collection(
            "todos_comments",
            vec![
                json!({ "id": "c1", "todosId": "1" }),
                json!({ "id": "c2", "todosId": "2" }),
            ],
        );

        let list = descriptor
            .fallback(&resolve("todos/2/comments"), &ListParams::new())
            .unwrap();
        let items = list.data().unwrap().as_array().unwrap().clone();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "c2");

        assert!(descriptor
            .fallback(&resolve("todos/2/comments/c1"), &ListParams::new())
            .is_none());
    }
}
