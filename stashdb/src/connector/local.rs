use super::Connector;
use crate::address::{self, Address};
use crate::config::{StashConfig, DEFAULT_STORAGE_KEY};
use crate::document::{
    self, Document, IdStrategy, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD,
};
use crate::error::{Result, StashDbError};
use crate::fault::FaultConfig;
use crate::query::{self, ListParams};
use crate::response::{PageMeta, Response};
use crate::schema::{CollectionSchema, SchemaDefinition, SchemaRegistry};
use crate::seed::SeedDescriptor;
use crate::storage::{self, Blob, BlobStorage};
use crate::validation;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Emulates a REST backend on top of a [`BlobStorage`].
///
/// All collections live in one blob under `storage_key`. Reads parse the whole
/// blob; writes parse, mutate and rewrite it inside a single critical section,
/// so concurrent operations on one connector never interleave.
pub struct LocalConnector<S: BlobStorage> {
    storage: S,
    storage_key: String,
    ids: IdStrategy,
    faults: FaultConfig,
    schemas: SchemaRegistry,
    write_lock: Mutex<()>,
}

/// Builder for [`LocalConnector`]. Seeding happens in [`build`](Self::build).
pub struct LocalConnectorBuilder<S: BlobStorage> {
    storage: S,
    storage_key: String,
    ids: IdStrategy,
    faults: FaultConfig,
    schemas: SchemaRegistry,
    seed: Option<SeedDescriptor>,
}

impl<S: BlobStorage> LocalConnectorBuilder<S> {
    pub fn storage_key(mut self, key: &str) -> Self {
        self.storage_key = key.to_string();
        self
    }

    pub fn id_strategy(mut self, ids: IdStrategy) -> Self {
        self.ids = ids;
        self
    }

    pub fn faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }

    pub fn seed(mut self, seed: SeedDescriptor) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn schema(mut self, collection: &str, schema: CollectionSchema) -> Self {
        self.schemas.register(collection, schema);
        self
    }

    /// Register every collection of a parsed schema file.
    pub fn schemas(mut self, definition: &SchemaDefinition) -> Self {
        self.schemas.register_all(definition);
        self
    }

    /// Create the connector and apply the seed, if any, before returning.
    pub fn build(self) -> Result<LocalConnector<S>> {
        let connector = LocalConnector {
            storage: self.storage,
            storage_key: self.storage_key,
            ids: self.ids,
            faults: self.faults,
            schemas: self.schemas,
            write_lock: Mutex::new(()),
        };

        if let Some(seed) = &self.seed {
            connector.apply_seed(seed)?;
        }

        Ok(connector)
    }
}

impl<S: BlobStorage> LocalConnector<S> {
    pub fn builder(storage: S) -> LocalConnectorBuilder<S> {
        LocalConnectorBuilder {
            storage,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            ids: IdStrategy::default(),
            faults: FaultConfig::default(),
            schemas: SchemaRegistry::new(),
            seed: None,
        }
    }

    /// Connector with default settings and no seed.
    pub fn new(storage: S) -> Result<Self> {
        Self::builder(storage).build()
    }

    /// Connector configured from a [`StashConfig`], seeded if it carries a seed.
    pub fn from_config(storage: S, config: &StashConfig) -> Result<Self> {
        let mut builder = Self::builder(storage)
            .storage_key(&config.storage_key)
            .id_strategy(config.id_strategy)
            .faults(config.faults);
        builder = builder.schemas(&SchemaDefinition {
            collections: config.schemas.clone(),
        });
        if let Some(seed) = &config.seed {
            builder = builder.seed(seed.clone());
        }
        builder.build()
    }

    /// Register the schema for a collection, replacing any previous one.
    /// Its defaults show up on every later read and write.
    pub fn register_schema(&mut self, collection: &str, schema: CollectionSchema) {
        self.schemas.register(collection, schema);
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// The whole stored blob, without defaults applied.
    pub fn snapshot(&self) -> Result<Blob> {
        storage::load_blob(&self.storage, &self.storage_key)
    }

    /// Names of all stored collections.
    pub fn collections(&self) -> Result<Vec<String>> {
        Ok(self.snapshot()?.into_keys().collect())
    }

    /// Remove every stored collection.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        log::info!("Clearing all data under '{}'", self.storage_key);
        self.storage.remove_item(&self.storage_key)
    }

    /// Merge a seed into the stored blob. Runs once at construction.
    fn apply_seed(&self, seed: &SeedDescriptor) -> Result<()> {
        let _guard = self.lock()?;
        let mut blob = self.load()?;
        let changed = seed.apply(&mut blob, self.ids);
        if !changed.is_empty() {
            self.save(&blob)?;
        }
        Ok(())
    }

    // ── Blob access ─────────────────────────────────────────────────

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StashDbError::Storage("connector lock poisoned".into()))
    }

    fn load(&self) -> Result<Blob> {
        storage::load_blob(&self.storage, &self.storage_key)
    }

    fn save(&self, blob: &Blob) -> Result<()> {
        storage::save_blob(&self.storage, &self.storage_key, blob)
    }

    fn with_defaults(&self, collection: &str, doc: Document) -> Document {
        validation::with_defaults(self.schemas.get(collection), doc)
    }

    // ── Operations ──────────────────────────────────────────────────

    fn read(&self, address: &Address, params: &ListParams) -> Result<(Value, Option<PageMeta>)> {
        let blob = self.load()?;
        let docs = blob
            .get(&address.collection)
            .map(Vec::as_slice)
            .unwrap_or_default();

        match &address.id {
            Some(id) => {
                let doc = docs
                    .iter()
                    .find(|d| address.matches_parents(d) && document::has_id(d, id))
                    .ok_or_else(|| not_found(address, id))?;
                let doc = self.with_defaults(&address.collection, doc.clone());
                Ok((Value::Object(doc), None))
            }
            None => {
                let scoped: Vec<Document> = docs
                    .iter()
                    .filter(|d| address.matches_parents(d))
                    .map(|d| self.with_defaults(&address.collection, d.clone()))
                    .collect();
                let (page, meta) = query::paginate(scoped, params);
                let items = page.into_iter().map(Value::Object).collect();
                Ok((Value::Array(items), Some(meta)))
            }
        }
    }

    fn insert(&self, address: &Address, payload: Value) -> Result<Document> {
        let mut doc = self.with_defaults(&address.collection, into_document(payload)?);

        let stamp = document::now();
        doc.insert(ID_FIELD.into(), Value::String(document::new_id(self.ids)));
        doc.insert(CREATED_AT_FIELD.into(), Value::String(stamp.clone()));
        doc.insert(UPDATED_AT_FIELD.into(), Value::String(stamp));
        stamp_parents(address, &mut doc);

        let _guard = self.lock()?;
        let mut blob = self.load()?;
        blob.entry(address.collection.clone())
            .or_default()
            .push(doc.clone());
        self.save(&blob)?;

        log::debug!(
            "Created {}/{}",
            address.collection,
            document::doc_id(&doc).unwrap_or_default()
        );
        Ok(doc)
    }

    /// Shared path for full and partial updates.
    fn modify(&self, address: &Address, payload: Value, merge: bool) -> Result<Document> {
        let payload = into_document(payload)?;
        let id = target_id(address, &payload)?;

        let _guard = self.lock()?;
        let mut blob = self.load()?;
        let docs = blob
            .get_mut(&address.collection)
            .ok_or_else(|| not_found(address, &id))?;
        let pos = docs
            .iter()
            .position(|d| address.matches_parents(d) && document::has_id(d, &id))
            .ok_or_else(|| not_found(address, &id))?;

        let old = &docs[pos];
        let next = if merge {
            let mut merged = old.clone();
            merged.extend(payload);
            merged
        } else {
            payload
        };
        let mut next = self.with_defaults(&address.collection, next);

        let stored_id = old
            .get(ID_FIELD)
            .cloned()
            .unwrap_or_else(|| Value::String(id.clone()));
        let created_at = old
            .get(CREATED_AT_FIELD)
            .cloned()
            .unwrap_or_else(|| Value::String(document::now()));
        next.insert(ID_FIELD.into(), stored_id);
        next.insert(CREATED_AT_FIELD.into(), created_at);
        next.insert(UPDATED_AT_FIELD.into(), Value::String(document::now()));
        stamp_parents(address, &mut next);

        docs[pos] = next.clone();
        self.save(&blob)?;

        log::debug!(
            "{} {}/{id}",
            if merge { "Patched" } else { "Replaced" },
            address.collection
        );
        Ok(next)
    }

    fn remove(&self, address: &Address) -> Result<Document> {
        let id = address
            .id
            .clone()
            .ok_or_else(|| StashDbError::InvalidRequest("Delete requires an id".into()))?;

        let _guard = self.lock()?;
        let mut blob = self.load()?;
        let docs = blob
            .get_mut(&address.collection)
            .ok_or_else(|| not_found(address, &id))?;
        // Position within the full collection, so siblings outside the
        // parent scope survive the rewrite.
        let pos = docs
            .iter()
            .position(|d| address.matches_parents(d) && document::has_id(d, &id))
            .ok_or_else(|| not_found(address, &id))?;
        let removed = docs.remove(pos);
        self.save(&blob)?;

        log::debug!("Deleted {}/{id}", address.collection);
        Ok(removed)
    }

    async fn run<T>(&self, op: &str, path: &str, f: impl FnOnce(&Address) -> Result<T>) -> Response<T> {
        let address = address::resolve(path);
        let result = match self.faults.before_operation().await {
            Ok(()) => f(&address),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            match e {
                StashDbError::NotFound { .. } | StashDbError::InvalidRequest(_) => {
                    log::debug!("{op} {path} failed: {e}")
                }
                _ => log::warn!("{op} {path} failed: {e}"),
            }
        }
        result.into()
    }
}

#[async_trait]
impl<S: BlobStorage> Connector for LocalConnector<S> {
    async fn get(&self, path: &str, params: &ListParams) -> Response<Value> {
        match self.run("GET", path, |addr| self.read(addr, params)).await {
            Response::Success {
                data: (data, Some(meta)),
                ..
            } => Response::page(data, meta),
            other => other.map(|(data, _)| data),
        }
    }

    async fn create(&self, path: &str, payload: Value) -> Response<Value> {
        self.run("CREATE", path, |addr| self.insert(addr, payload))
            .await
            .map(Value::Object)
            .with_message("Created")
    }

    async fn update(&self, path: &str, payload: Value) -> Response<Value> {
        self.run("UPDATE", path, |addr| self.modify(addr, payload, false))
            .await
            .map(Value::Object)
            .with_message("Updated")
    }

    async fn patch(&self, path: &str, payload: Value) -> Response<Value> {
        self.run("PATCH", path, |addr| self.modify(addr, payload, true))
            .await
            .map(Value::Object)
            .with_message("Updated")
    }

    async fn delete(&self, path: &str) -> Response<Value> {
        self.run("DELETE", path, |addr| self.remove(addr))
            .await
            .map(Value::Object)
            .with_message("Deleted")
    }
}

fn not_found(address: &Address, id: &str) -> StashDbError {
    StashDbError::NotFound {
        collection: address.collection.clone(),
        id: id.to_string(),
    }
}

fn into_document(payload: Value) -> Result<Document> {
    document::from_value(payload)
        .ok_or_else(|| StashDbError::InvalidRequest("Payload must be a JSON object".into()))
}

/// The path id if present, else the payload's own id.
fn target_id(address: &Address, payload: &Document) -> Result<String> {
    address
        .id
        .clone()
        .or_else(|| document::doc_id(payload))
        .ok_or_else(|| {
            StashDbError::InvalidRequest(format!(
                "No id in path or payload for '{}'",
                address.collection
            ))
        })
}

fn stamp_parents(address: &Address, doc: &mut Document) {
    for (field, value) in &address.parent_filters {
        doc.insert(field.clone(), Value::String(value.clone()));
    }
}
