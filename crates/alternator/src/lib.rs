//! alternator: declarative tables over DynamoDB.
//!
//! A [`Database`] is connected to a [`Store`] with a manifest of
//! [`TableDefinition`]s. On connect the manifest is reconciled against the
//! store in the background: missing tables are created and existing ones are
//! checked for key and attribute drift. [`TableHandle`] operations wait for
//! that to finish and accept [`Deferred`] values anywhere in their arguments,
//! so dependent calls can be chained without awaiting each step.

pub mod config;
pub mod context;
pub mod storage;

pub use alternator_core::{request, schema, store, value};

pub use alternator_core::request::{KeyArg, Options, QueryResult};
pub use alternator_core::schema::{
    parse_manifest, BillingMode, KeyRole, LocalTable, ScalarType, TableDefinition,
};
pub use alternator_core::store::Store;
pub use alternator_core::value::{resolve, Arg, Deferred, Map, Value};
pub use alternator_core::{Error, Result, SchemaPart, StoreError};

pub use config::StoreConfig;
pub use context::{Database, TableHandle};
#[cfg(feature = "dynamodb")]
pub use storage::DynamoDbStore;
pub use storage::InMemoryStore;
