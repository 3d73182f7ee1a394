//! CRUD connectors addressed by endpoint paths.
//!
//! [`LocalConnector`] emulates a REST backend over a key-value blob;
//! [`RemoteConnector`] forwards the same calls to a real HTTP server. Both
//! answer with the same [`Response`] envelope.

mod local;
mod remote;

pub use local::{LocalConnector, LocalConnectorBuilder};
pub use remote::RemoteConnector;

use crate::query::ListParams;
use crate::response::Response;
use async_trait::async_trait;
use serde_json::Value;

/// The operation surface shared by every connector.
///
/// Paths follow the endpoint grammar of [`crate::address::resolve`]. None of
/// these methods fail outside the envelope, and a failure leaves the
/// connector usable.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Read one document (`todos/1`) or a page of documents (`todos`).
    async fn get(&self, path: &str, params: &ListParams) -> Response<Value>;

    /// Create a document and return it with its generated fields.
    async fn create(&self, path: &str, payload: Value) -> Response<Value>;

    /// Replace a document. The id comes from the path, else from `payload.id`.
    async fn update(&self, path: &str, payload: Value) -> Response<Value>;

    /// Shallow-merge `payload` into a document.
    async fn patch(&self, path: &str, payload: Value) -> Response<Value>;

    /// Delete one document and return it.
    async fn delete(&self, path: &str) -> Response<Value>;
}
