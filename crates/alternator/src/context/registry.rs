//! The table registry: name to local table descriptor.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::{BoxFuture, Shared};

use alternator_core::schema::LocalTable;
use alternator_core::Result;

/// A local table descriptor that becomes available once its remote step
/// (verify or create) has completed.
pub(crate) type Registration = Shared<BoxFuture<'static, Result<Arc<LocalTable>>>>;

/// Name to [`Registration`] mapping owned by a database context.
///
/// Entries are replaced, never mutated. The lock is never held across an
/// await point.
#[derive(Default)]
pub(crate) struct Registry {
    tables: RwLock<HashMap<String, Registration>>,
}

impl Registry {
    /// Inserts `registration`, returning the entry it replaced.
    pub fn register(&self, name: &str, registration: Registration) -> Option<Registration> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), registration)
    }

    /// Puts `previous` back under `name`, but only while `current` is still
    /// the entry there. A later registration is left alone.
    pub fn restore(&self, name: &str, current: &Registration, previous: Option<Registration>) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !tables.get(name).is_some_and(|entry| entry.ptr_eq(current)) {
            return;
        }
        match previous {
            Some(previous) => tables.insert(name.to_string(), previous),
            None => tables.remove(name),
        };
    }

    /// Removes the entry for `name`, returning whether one existed.
    pub fn evict(&self, name: &str) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Registration> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
