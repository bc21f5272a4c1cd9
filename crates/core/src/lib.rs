//! Core for alternator: a thin data-access layer over a hash/range key-value store.
//!
//! This crate is the functional core. Nothing in here performs I/O; the store
//! itself is reached through the [`store::Store`] trait, implemented by the
//! `alternator` crate.

pub mod error;
pub mod request;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{Error, Result, SchemaPart, StoreError};
