// Address resolution - endpoint paths to (collection, id, parent filters)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collection used when a path has no segments at all.
pub const DEFAULT_COLLECTION: &str = "items";

/// A resolved endpoint path.
///
/// With an `id` the address denotes zero or one document; without one it
/// denotes the parent-filtered sub-sequence of `collection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub collection: String,
    pub id: Option<String>,
    pub parent_filters: BTreeMap<String, String>,
}

impl Address {
    /// Whether this address points at a single document.
    pub fn is_item(&self) -> bool {
        self.id.is_some()
    }

    /// Whether the document carries every parent reference of this address.
    pub fn matches_parents(&self, doc: &serde_json::Map<String, serde_json::Value>) -> bool {
        self.parent_filters.iter().all(|(field, expected)| {
            doc.get(field)
                .map(|v| value_matches_str(v, expected))
                .unwrap_or(false)
        })
    }
}

/// Split `path?query` into its path and optional query string.
pub fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    }
}

/// Resolve an endpoint path into an [`Address`]. Never fails.
///
/// `todos` and `todos/1` address a top-level collection. Longer paths are read
/// as alternating collection/id pairs that flatten into one collection:
/// `todos/1/comments` becomes `todos_comments` filtered by `todosId = "1"`, and
/// `todos/1/comments/9` addresses item `9` in that view.
pub fn resolve(path: &str) -> Address {
    let (path, _) = split_query(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() <= 2 {
        return Address {
            collection: segments
                .first()
                .map(|s| s.to_string())
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            id: segments.get(1).map(|s| s.to_string()),
            parent_filters: BTreeMap::new(),
        };
    }

    let has_target_id = segments.len() % 2 == 0;
    let pair_segments = if has_target_id {
        &segments[..segments.len() - 1]
    } else {
        &segments[..]
    };

    let mut names = Vec::new();
    let mut parent_filters = BTreeMap::new();
    for (i, segment) in pair_segments.iter().enumerate() {
        if i % 2 == 0 {
            names.push(*segment);
        } else {
            let parent = pair_segments[i - 1];
            parent_filters.insert(format!("{parent}Id"), segment.to_string());
        }
    }

    Address {
        collection: names.join("_"),
        id: has_target_id.then(|| segments[segments.len() - 1].to_string()),
        parent_filters,
    }
}

/// Compare a stored field with a path-derived string id.
///
/// Path segments are always strings while stored references may be numbers.
pub(crate) fn value_matches_str(value: &serde_json::Value, expected: &str) -> bool {
    match value {
        serde_json::Value::String(s) => s == expected,
        serde_json::Value::Number(n) => n.to_string() == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_collection() {
        let addr = resolve("todos");
        assert_eq!(addr.collection, "todos");
        assert_eq!(addr.id, None);
        assert!(addr.parent_filters.is_empty());
    }

    #[test]
    fn test_resolve_item() {
        let addr = resolve("/todos/123/");
        assert_eq!(addr.collection, "todos");
        assert_eq!(addr.id.as_deref(), Some("123"));
        assert!(addr.is_item());
    }

    #[test]
    fn test_resolve_empty_path() {
        assert_eq!(resolve("").collection, DEFAULT_COLLECTION);
        assert_eq!(resolve("///").collection, DEFAULT_COLLECTION);
        assert_eq!(resolve("?page=2").collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn test_resolve_nested_list() {
        let addr = resolve("todos/123/comments");
        assert_eq!(addr.collection, "todos_comments");
        assert_eq!(addr.id, None);
        assert_eq!(addr.parent_filters.get("todosId").map(String::as_str), Some("123"));
        assert_eq!(addr.parent_filters.len(), 1);
    }

    #[test]
    fn test_resolve_nested_item() {
        let addr = resolve("/todos/123/comments/456");
        assert_eq!(addr.collection, "todos_comments");
        assert_eq!(addr.id.as_deref(), Some("456"));
        assert_eq!(addr.parent_filters.len(), 1);
        assert!(!addr.parent_filters.contains_key("commentsId"));
    }

    #[test]
    fn test_resolve_deeply_nested() {
        let addr = resolve("users/u1/posts/p2/comments");
        assert_eq!(addr.collection, "users_posts_comments");
        assert_eq!(addr.parent_filters["usersId"], "u1");
        assert_eq!(addr.parent_filters["postsId"], "p2");
        assert_eq!(addr.id, None);
    }

    #[test]
    fn test_query_string_stripped() {
        let addr = resolve("todos/5?expand=true&x=1");
        assert_eq!(addr.collection, "todos");
        assert_eq!(addr.id.as_deref(), Some("5"));

        assert_eq!(split_query("todos?page=2"), ("todos", Some("page=2")));
        assert_eq!(split_query("todos"), ("todos", None));
    }

    #[test]
    fn test_matches_parents() {
        let addr = resolve("todos/7/comments");
        let hit = json!({ "todosId": "7", "text": "x" });
        let numeric = json!({ "todosId": 7 });
        let miss = json!({ "todosId": "8" });
        let absent = json!({ "text": "y" });
        assert!(addr.matches_parents(hit.as_object().unwrap()));
        assert!(addr.matches_parents(numeric.as_object().unwrap()));
        assert!(!addr.matches_parents(miss.as_object().unwrap()));
        assert!(!addr.matches_parents(absent.as_object().unwrap()));
    }
}
