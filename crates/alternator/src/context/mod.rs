//! Database context: owns the store, the table registry and the readiness gate.

mod reconcile;
mod registry;
mod table;

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};

use alternator_core::schema::{
    create_table_request, filter_listed_names, LocalTable, TableDefinition,
};
use alternator_core::store::Store;
use alternator_core::{Error, Result};

use registry::Registry;

pub use table::TableHandle;

/// Completes once startup reconciliation has finished, with its outcome.
type Gate = Shared<BoxFuture<'static, Result<()>>>;

pub(crate) struct Context {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) registry: Registry,
}

/// A connected database.
///
/// Cloning is cheap; clones share the store, the registry and the gate.
#[derive(Clone)]
pub struct Database {
    context: Arc<Context>,
    ready: Gate,
}

impl Database {
    /// Connects to `store` and starts reconciling `manifest` in the background.
    ///
    /// Must be called from within a tokio runtime. Table operations issued
    /// before reconciliation completes wait for it.
    pub fn connect(store: Arc<dyn Store>, manifest: Vec<TableDefinition>) -> Self {
        let context = Arc::new(Context {
            store,
            registry: Registry::default(),
        });

        let ready: Gate = reconcile::reconcile(context.clone(), manifest)
            .boxed()
            .shared();

        let watcher = ready.clone();
        tokio::spawn(async move {
            if let Err(error) = watcher.await {
                tracing::error!(%error, "Table reconciliation failed");
            }
        });

        Self { context, ready }
    }

    /// Waits for startup reconciliation and returns its outcome.
    pub async fn ready(&self) -> Result<()> {
        self.ready.clone().await
    }

    /// Returns a handle for `name`. The name is resolved against the registry
    /// on each operation, not here.
    pub fn table(&self, name: impl Into<String>) -> TableHandle {
        TableHandle::new(self.context.clone(), self.ready.clone(), name.into())
    }

    /// Creates a table remotely and registers it once the create completes.
    ///
    /// The registration is visible immediately; operations on the table wait
    /// for the create to finish. If the create fails, whatever was registered
    /// under the name before is put back.
    pub async fn create_table(&self, definition: TableDefinition) -> Result<()> {
        definition.validate()?;

        let store = self.context.store.clone();
        let request = create_table_request(&definition);
        let created = async move { store.create_table(&request).await.map_err(Error::from) }
            .boxed()
            .shared();

        let table = Arc::new(LocalTable::from(&definition));
        let registration = created
            .clone()
            .map(move |result| result.map(|_| table))
            .boxed()
            .shared();
        let previous = self
            .context
            .registry
            .register(&definition.name, registration.clone());

        if let Err(error) = created.await {
            self.context
                .registry
                .restore(&definition.name, &registration, previous);
            tracing::warn!(table = %definition.name, %error, "Failed to create table");
            return Err(error);
        }

        tracing::info!(table = %definition.name, "Created table");
        Ok(())
    }

    /// Deletes a table remotely. The registry entry is evicted once the call
    /// completes, whatever its outcome.
    pub async fn delete_table(&self, name: &str) -> Result<()> {
        let result = self.context.store.delete_table(name).await;
        self.context.registry.evict(name);

        match &result {
            Ok(()) => tracing::info!(table = %name, "Deleted table"),
            Err(error) => tracing::warn!(table = %name, %error, "Failed to delete table"),
        }
        result.map_err(Error::from)
    }

    /// Lists remote table names, without the listing sentinel.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let names = self.context.store.list_tables().await?;
        Ok(filter_listed_names(names))
    }

    /// Names currently registered, sorted.
    pub fn registered_tables(&self) -> Vec<String> {
        self.context.registry.names()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.registered_tables())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use alternator_core::request::Options;
    use alternator_core::schema::ScalarType;
    use alternator_core::store::{
        CreateTableRequest, DeleteItemRequest, GetItemRequest, ItemPage, PutItemRequest,
        QueryRequest, ScanRequest, StoreResult, TableDescription, UpdateItemRequest,
    };
    use alternator_core::value::{Map, Value};
    use alternator_core::{SchemaPart, StoreError};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use crate::storage::{InMemoryStore, StoreCall};

    /// Holds `list_tables` until the gate has a permit; can fail the listing.
    #[derive(Clone)]
    struct GatedStore {
        inner: InMemoryStore,
        gate: Arc<Semaphore>,
        fail_listing: bool,
    }

    impl GatedStore {
        fn new(inner: InMemoryStore) -> Self {
            Self {
                inner,
                gate: Arc::new(Semaphore::new(0)),
                fail_listing: false,
            }
        }
    }

    #[async_trait]
    impl Store for GatedStore {
        async fn list_tables(&self) -> StoreResult<Vec<String>> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| StoreError::Service(e.to_string()))?;
            if self.fail_listing {
                return Err(StoreError::Service("listing failed".to_string()));
            }
            self.inner.list_tables().await
        }

        async fn describe_table(&self, table_name: &str) -> StoreResult<TableDescription> {
            self.inner.describe_table(table_name).await
        }

        async fn create_table(&self, request: &CreateTableRequest) -> StoreResult<()> {
            self.inner.create_table(request).await
        }

        async fn delete_table(&self, table_name: &str) -> StoreResult<()> {
            self.inner.delete_table(table_name).await
        }

        async fn get_item(&self, request: &GetItemRequest) -> StoreResult<Option<Map>> {
            self.inner.get_item(request).await
        }

        async fn put_item(&self, request: &PutItemRequest) -> StoreResult<()> {
            self.inner.put_item(request).await
        }

        async fn update_item(&self, request: &UpdateItemRequest) -> StoreResult<Map> {
            self.inner.update_item(request).await
        }

        async fn query(&self, request: &QueryRequest) -> StoreResult<ItemPage> {
            self.inner.query(request).await
        }

        async fn scan(&self, request: &ScanRequest) -> StoreResult<ItemPage> {
            self.inner.scan(request).await
        }

        async fn delete_item(&self, request: &DeleteItemRequest) -> StoreResult<()> {
            self.inner.delete_item(request).await
        }
    }

    fn test_table() -> TableDefinition {
        TableDefinition::new("test").with_hash_key("id", ScalarType::String)
    }

    fn manifest() -> Vec<TableDefinition> {
        vec![
            test_table(),
            TableDefinition::new("users")
                .with_hash_key("name", ScalarType::String)
                .with_range_key("version", ScalarType::Number),
        ]
    }

    fn item(json: serde_json::Value) -> Options {
        Options::new().item(json)
    }

    async fn create_remote(store: &InMemoryStore, definition: &TableDefinition) {
        store
            .create_table(&create_table_request(definition))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ready_creates_missing_tables() {
        let store = Arc::new(InMemoryStore::new());

        let database = Database::connect(store.clone(), manifest());
        database.ready().await.unwrap();

        assert_eq!(store.list_tables().await.unwrap(), vec!["test", "users"]);
        assert_eq!(database.registered_tables(), vec!["test", "users"]);
    }

    #[tokio::test]
    async fn test_identical_manifest_reconciles_without_create() {
        let store = Arc::new(InMemoryStore::new());
        Database::connect(store.clone(), manifest())
            .ready()
            .await
            .unwrap();
        store.clear_calls().await;

        let database = Database::connect(store.clone(), manifest());
        database.ready().await.unwrap();

        let calls = store.calls().await;
        assert!(!calls.iter().any(|c| matches!(c, StoreCall::CreateTable(_))));
        assert_eq!(
            calls.iter().filter(|c| matches!(c, StoreCall::DescribeTable(_))).count(),
            2
        );
        assert_eq!(database.registered_tables(), vec!["test", "users"]);
    }

    #[tokio::test]
    async fn test_key_mismatch_fails_ready() {
        let store = Arc::new(InMemoryStore::new());
        create_remote(&store, &test_table()).await;

        let manifest = vec![TableDefinition::new("test")
            .with_hash_key("id", ScalarType::String)
            .with_range_key("foo", ScalarType::Number)];
        let result = Database::connect(store, manifest).ready().await;

        match result {
            Err(Error::SchemaMismatch { table, part, .. }) => {
                assert_eq!(table, "test");
                assert_eq!(part, SchemaPart::Key);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_attribute_mismatch_fails_ready() {
        let store = Arc::new(InMemoryStore::new());
        create_remote(
            &store,
            &TableDefinition::new("test").with_hash_key("id", ScalarType::Number),
        )
        .await;

        let result = Database::connect(store, vec![test_table()]).ready().await;

        assert!(matches!(
            result,
            Err(Error::SchemaMismatch {
                part: SchemaPart::Attributes,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_matching_tables_stay_usable_when_another_mismatches() {
        let store = Arc::new(InMemoryStore::new());
        create_remote(
            &store,
            &TableDefinition::new("bad").with_hash_key("id", ScalarType::Number),
        )
        .await;

        let manifest = vec![
            test_table(),
            TableDefinition::new("bad").with_hash_key("id", ScalarType::String),
        ];
        let database = Database::connect(store, manifest);

        assert!(database.ready().await.is_err());

        let created = database
            .table("test")
            .create(item(json!({"id": "a", "foo": "bar"})))
            .await
            .unwrap();
        assert_eq!(created.get("foo"), Some(&"bar".into()));

        let result = database.table("bad").get("a").await;
        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn test_invalid_manifest_fails_before_store_calls() {
        let store = Arc::new(InMemoryStore::new());
        let manifest = vec![TableDefinition::new("test")];

        let result = Database::connect(store.clone(), manifest).ready().await;

        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(store.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_table_is_configuration_error() {
        let database = Database::connect(Arc::new(InMemoryStore::new()), manifest());

        let result = database.table("missing").get("a").await;

        assert_eq!(
            result,
            Err(Error::configuration("No table named missing has been described"))
        );
    }

    #[tokio::test]
    async fn test_operations_wait_for_reconciliation() {
        let inner = InMemoryStore::new();
        let store = GatedStore::new(inner.clone());
        let gate = store.gate.clone();
        let database = Database::connect(Arc::new(store), manifest());
        let table = database.table("test");

        let created = table.create_deferred(item(json!({"id": "a", "foo": "bar"})));
        let fetched = tokio::spawn(table.get(created.get("id")));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(inner.calls().await.is_empty());

        gate.add_permits(1);
        let document = fetched.await.unwrap().unwrap();
        assert_eq!(document.get("foo"), Some(&"bar".into()));

        let calls = inner.calls().await;
        let first_item_call = calls.iter().position(StoreCall::is_item_call).unwrap();
        let last_table_call = calls.iter().rposition(|c| !c.is_item_call()).unwrap();
        assert!(last_table_call < first_item_call, "calls: {calls:?}");
    }

    #[tokio::test]
    async fn test_failed_listing_fails_ready_and_operations() {
        let mut store = GatedStore::new(InMemoryStore::new());
        store.fail_listing = true;
        store.gate.add_permits(1);
        let database = Database::connect(Arc::new(store), manifest());

        assert_eq!(
            database.ready().await,
            Err(Error::Store(StoreError::Service("listing failed".to_string())))
        );
        assert!(matches!(
            database.table("test").get("a").await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_create_table_registers_table() {
        let store = Arc::new(InMemoryStore::new());
        let database = Database::connect(store.clone(), Vec::new());
        database.ready().await.unwrap();

        database.create_table(test_table()).await.unwrap();

        assert_eq!(database.registered_tables(), vec!["test"]);
        let created = database
            .table("test")
            .create(item(json!({"id": "a"})))
            .await
            .unwrap();
        assert_eq!(created.get("id"), Some(&"a".into()));
    }

    #[tokio::test]
    async fn test_create_table_validates_before_store_call() {
        let store = Arc::new(InMemoryStore::new());
        let database = Database::connect(store.clone(), Vec::new());
        database.ready().await.unwrap();
        store.clear_calls().await;

        let result = database.create_table(TableDefinition::new("test")).await;

        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(store.calls().await.is_empty());
        assert!(database.registered_tables().is_empty());
    }

    #[tokio::test]
    async fn test_create_existing_table_fails_with_store_error() {
        let store = Arc::new(InMemoryStore::new());
        let database = Database::connect(store, vec![test_table()]);
        database.ready().await.unwrap();

        let result = database.create_table(test_table()).await;

        assert!(matches!(
            result,
            Err(Error::Store(StoreError::ResourceInUse(_)))
        ));
    }

    #[tokio::test]
    async fn test_failed_create_keeps_reconciled_table_usable() {
        let store = Arc::new(InMemoryStore::new());
        let database = Database::connect(store, vec![test_table()]);
        let table = database.table("test");
        table.create(item(json!({"id": "a"}))).await.unwrap();

        let result = database.create_table(test_table()).await;
        let fetched = table.get("a").await;

        assert!(matches!(
            result,
            Err(Error::Store(StoreError::ResourceInUse(_)))
        ));
        assert_eq!(fetched.unwrap().get("id"), Some(&Value::from("a")));
    }

    #[tokio::test]
    async fn test_failed_create_of_unregistered_table_leaves_no_entry() {
        let store = Arc::new(InMemoryStore::new());
        create_remote(&store, &test_table()).await;
        let database = Database::connect(store, Vec::new());
        database.ready().await.unwrap();

        let result = database.create_table(test_table()).await;

        assert!(result.is_err());
        assert!(database.registered_tables().is_empty());
        assert!(matches!(
            database.table("test").get("a").await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_table_evicts_registration() {
        let store = Arc::new(InMemoryStore::new());
        let database = Database::connect(store.clone(), manifest());
        database.ready().await.unwrap();

        database.delete_table("test").await.unwrap();

        assert_eq!(database.registered_tables(), vec!["users"]);
        assert_eq!(store.list_tables().await.unwrap(), vec!["users"]);
        assert!(matches!(
            database.table("test").get("a").await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_delete_still_evicts_registration() {
        let store = Arc::new(InMemoryStore::new());
        let database = Database::connect(store.clone(), manifest());
        database.ready().await.unwrap();
        store.delete_table("test").await.unwrap();

        let result = database.delete_table("test").await;

        assert!(matches!(
            result,
            Err(Error::Store(StoreError::ResourceNotFound(_)))
        ));
        assert_eq!(database.registered_tables(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_list_tables_drops_sentinel() {
        let store = Arc::new(InMemoryStore::new());
        create_remote(
            &store,
            &TableDefinition::new("table_name").with_hash_key("id", ScalarType::String),
        )
        .await;
        let database = Database::connect(store, vec![test_table()]);
        database.ready().await.unwrap();

        assert_eq!(database.list_tables().await.unwrap(), vec!["test"]);
    }
}
