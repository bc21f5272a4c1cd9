//! Store implementations.
//!
//! - [`InMemoryStore`]: process-local tables, for tests and local runs.
//! - [`DynamoDbStore`]: AWS DynamoDB (feature `dynamodb`).

#[cfg(feature = "dynamodb")]
mod dynamodb;
mod inmemory;

#[cfg(feature = "dynamodb")]
pub use dynamodb::{create_client, DynamoDbStore};
pub use inmemory::{InMemoryStore, StoreCall};
