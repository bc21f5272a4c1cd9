//! In-memory storage backend.
//!
//! Keeps tables in process memory and evaluates condition and update
//! expressions itself. Useful for tests and for running without DynamoDB.

mod expression;
mod store;

pub use store::{InMemoryStore, StoreCall};
