//! DynamoDB storage backend.
//!
//! Implements [`alternator_core::store::Store`] with `aws-sdk-dynamodb`.

mod conversions;
mod error;
mod store;

pub use store::{create_client, DynamoDbStore};
