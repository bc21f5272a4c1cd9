//! Per-table operations.

use std::future::Future;
use std::sync::Arc;

use alternator_core::request::{
    build_delete, build_get, build_put, build_query, build_scan, build_update, normalize,
    project_page, KeyArg, QueryResult,
};
use alternator_core::schema::LocalTable;
use alternator_core::value::{Deferred, Map};
use alternator_core::{Error, Result};

use super::{Context, Gate};

/// Operations on one named table.
///
/// Every operation waits for reconciliation, then looks the table up in the
/// registry, then resolves its arguments. None of them issue a store call
/// before reconciliation has settled. The returned futures own everything
/// they need, so they can be spawned or wrapped in a [`Deferred`].
#[derive(Clone)]
pub struct TableHandle {
    context: Arc<Context>,
    ready: Gate,
    name: Arc<str>,
}

impl TableHandle {
    pub(super) fn new(context: Arc<Context>, ready: Gate, name: String) -> Self {
        Self {
            context,
            ready,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetches one item. A missing item is an [`Error::NotFound`].
    pub fn get(&self, key: impl Into<KeyArg>) -> impl Future<Output = Result<Map>> + Send + 'static {
        let handle = self.clone();
        let key = key.into();
        async move {
            let table = handle.local_table().await?;
            let request = build_get(&table, normalize(&table, key).await?)?;

            tracing::debug!(table = %table.name, key = %request.key, "get");
            let item = handle.context.store.get_item(&request).await?;

            item.ok_or_else(|| Error::NotFound {
                table: table.name.clone(),
                key: request.key.to_string(),
            })
        }
    }

    /// Writes an item and returns the item as supplied.
    pub fn create(
        &self,
        options: impl Into<KeyArg>,
    ) -> impl Future<Output = Result<Map>> + Send + 'static {
        let handle = self.clone();
        let options = options.into();
        async move {
            let table = handle.local_table().await?;
            let request = build_put(&table, normalize(&table, options).await?)?;

            tracing::debug!(table = %table.name, "create");
            handle.context.store.put_item(&request).await?;

            Ok(request.item)
        }
    }

    /// Updates an item and returns all of its attributes after the update.
    pub fn update(
        &self,
        options: impl Into<KeyArg>,
    ) -> impl Future<Output = Result<Map>> + Send + 'static {
        let handle = self.clone();
        let options = options.into();
        async move {
            let table = handle.local_table().await?;
            let request = build_update(&table, normalize(&table, options).await?)?;

            tracing::debug!(
                table = %table.name,
                key = %request.key,
                expression = %request.update_expression,
                "update"
            );
            Ok(handle.context.store.update_item(&request).await?)
        }
    }

    /// Queries by key condition.
    pub fn find_all(
        &self,
        options: impl Into<KeyArg>,
    ) -> impl Future<Output = Result<QueryResult>> + Send + 'static {
        let handle = self.clone();
        let options = options.into();
        async move {
            let table = handle.local_table().await?;
            let request = build_query(&table, normalize(&table, options).await?)?;

            tracing::debug!(
                table = %table.name,
                expression = %request.key_condition_expression,
                limit = ?request.limit,
                forward = ?request.scan_index_forward,
                "findAll"
            );
            let page = handle.context.store.query(&request).await?;

            Ok(project_page(page))
        }
    }

    /// Scans the table, optionally filtered.
    pub fn scan(
        &self,
        options: impl Into<KeyArg>,
    ) -> impl Future<Output = Result<QueryResult>> + Send + 'static {
        let handle = self.clone();
        let options = options.into();
        async move {
            let table = handle.local_table().await?;
            let request = build_scan(&table, normalize(&table, options).await?);

            tracing::debug!(
                table = %table.name,
                filter = ?request.filter_expression,
                limit = ?request.limit,
                "scan"
            );
            let page = handle.context.store.scan(&request).await?;

            Ok(project_page(page))
        }
    }

    /// Deletes one item. Deleting an absent item succeeds.
    pub fn remove(
        &self,
        key: impl Into<KeyArg>,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let handle = self.clone();
        let key = key.into();
        async move {
            let table = handle.local_table().await?;
            let request = build_delete(&table, normalize(&table, key).await?)?;

            tracing::debug!(table = %table.name, key = %request.key, "remove");
            handle.context.store.delete_item(&request).await?;

            Ok(())
        }
    }

    /// Like [`get`](Self::get), but returns a shareable deferred result that
    /// can be fed into later operations.
    pub fn get_deferred(&self, key: impl Into<KeyArg>) -> Deferred {
        Deferred::new(self.get(key))
    }

    /// Deferred form of [`create`](Self::create).
    pub fn create_deferred(&self, options: impl Into<KeyArg>) -> Deferred {
        Deferred::new(self.create(options))
    }

    /// Deferred form of [`update`](Self::update).
    pub fn update_deferred(&self, options: impl Into<KeyArg>) -> Deferred {
        Deferred::new(self.update(options))
    }

    /// Deferred form of [`find_all`](Self::find_all).
    pub fn find_all_deferred(&self, options: impl Into<KeyArg>) -> Deferred {
        Deferred::new(self.find_all(options))
    }

    /// Deferred form of [`scan`](Self::scan).
    pub fn scan_deferred(&self, options: impl Into<KeyArg>) -> Deferred {
        Deferred::new(self.scan(options))
    }

    /// Deferred form of [`remove`](Self::remove).
    pub fn remove_deferred(&self, key: impl Into<KeyArg>) -> Deferred {
        Deferred::new(self.remove(key))
    }

    /// Waits for reconciliation, then for this table's registration.
    async fn local_table(&self) -> Result<Arc<LocalTable>> {
        // Either outcome opens the gate; a failure is reported by `ready()`.
        let _ = self.ready.clone().await;

        let registration = self.context.registry.lookup(&self.name).ok_or_else(|| {
            Error::configuration(format!("No table named {} has been described", self.name))
        })?;

        registration.await
    }
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
