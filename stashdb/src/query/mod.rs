// List parameters, filtering and pagination

use crate::document::Document;
use crate::response::PageMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;

/// Paging and exact-match filters for list reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }

    /// Build params from a `k=v&...` query string. `page` and `limit` are
    /// paging controls; every other pair becomes a filter holding the raw
    /// text, which [`ListParams::matches`] compares against stored scalars.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = ListParams::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => params.page = value.parse().ok(),
                "limit" => params.limit = value.parse().ok(),
                _ => {
                    params
                        .filters
                        .insert(key.into_owned(), Value::String(value.into_owned()));
                }
            }
        }
        params
    }

    /// Split `path?query` into the bare path and params parsed from the query.
    pub fn from_endpoint(endpoint: &str) -> (&str, Self) {
        let (path, query) = crate::address::split_query(endpoint);
        (path, query.map(Self::from_query).unwrap_or_default())
    }

    /// Render as query pairs, the inverse of [`ListParams::from_query`].
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        for (key, value) in &self.filters {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            pairs.push((key.clone(), rendered));
        }
        pairs
    }

    /// Effective 1-based page number.
    pub fn effective_page(&self) -> usize {
        self.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE)
    }

    /// Effective page size.
    pub fn effective_limit(&self) -> usize {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
    }

    /// Whether a document satisfies every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|(field, expected)| {
            doc.get(field)
                .map(|actual| values_match(actual, expected))
                .unwrap_or(false)
        })
    }
}

/// Exact equality. Text also matches a number or boolean it spells, so
/// `"1.50"` matches a stored `1.5` but a stored `"1.50"` only matches `"1.50"`.
fn values_match(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(text), scalar @ (Value::Number(_) | Value::Bool(_)))
        | (scalar @ (Value::Number(_) | Value::Bool(_)), Value::String(text)) => {
            text_spells(text, scalar)
        }
        _ => false,
    }
}

fn text_spells(text: &str, scalar: &Value) -> bool {
    match (serde_json::from_str::<Value>(text), scalar) {
        (Ok(Value::Bool(parsed)), Value::Bool(b)) => parsed == *b,
        (Ok(Value::Number(parsed)), Value::Number(n)) => {
            parsed == *n || parsed.as_f64().is_some_and(|x| Some(x) == n.as_f64())
        }
        _ => false,
    }
}

/// Apply filters then slice out the requested page.
///
/// `total` and `totalPages` count the filtered set; a page past the end is
/// empty but still reports them.
pub fn paginate(docs: Vec<Document>, params: &ListParams) -> (Vec<Document>, PageMeta) {
    let filtered: Vec<Document> = docs.into_iter().filter(|d| params.matches(d)).collect();

    let page = params.effective_page();
    let limit = params.effective_limit();
    let total = filtered.len();
    let total_pages = total.div_ceil(limit);
    let start = (page - 1).saturating_mul(limit);

    let items = filtered.into_iter().skip(start).take(limit).collect();
    (
        items,
        PageMeta {
            total,
            page,
            limit,
            total_pages,
        },
    )
}
