pub mod address;
pub mod config;
pub mod connector;
pub mod document;
pub mod error;
pub mod fault;
pub mod query;
pub mod response;
pub mod schema;
pub mod seed;
pub mod storage;
pub mod validation;

pub use address::{resolve, Address};
pub use config::{RemoteConfig, StashConfig};
pub use connector::{Connector, LocalConnector, LocalConnectorBuilder, RemoteConnector};
pub use document::{Document, IdStrategy};
pub use error::{ErrorCode, Result, StashDbError};
pub use fault::FaultConfig;
pub use query::ListParams;
pub use response::{PageMeta, Response};
pub use schema::{CollectionSchema, SchemaDefinition, SchemaRegistry};
pub use seed::{MergeStrategy, SeedBehavior, SeedDescriptor};
pub use storage::{BlobStorage, FileStorage, MemoryStorage};
