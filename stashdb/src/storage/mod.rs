//! The host key-value boundary.
//!
//! All collections live in one serialized [`Blob`] stored under a single key.
//! Every mutating operation reads the whole blob and writes it back whole.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::document::Document;
use crate::error::{Result, StashDbError};
use std::collections::BTreeMap;

/// The entire persisted state: collection name to ordered documents.
pub type Blob = BTreeMap<String, Vec<Document>>;

/// String key-value storage in the style of browser `localStorage`.
pub trait BlobStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

impl<S: BlobStorage + ?Sized> BlobStorage for std::sync::Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }
}

/// Read and parse the blob under `key`. A missing or empty value is an empty blob.
pub fn load_blob(storage: &dyn BlobStorage, key: &str) -> Result<Blob> {
    match storage.get_item(key)? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
            StashDbError::Storage(format!("Stored data under '{key}' is not a valid blob: {e}"))
        }),
        _ => Ok(Blob::new()),
    }
}

/// Serialize and write the whole blob under `key`.
pub fn save_blob(storage: &dyn BlobStorage, key: &str, blob: &Blob) -> Result<()> {
    let raw = serde_json::to_string(blob)?;
    storage.set_item(key, &raw)
}
