use async_trait::async_trait;

use crate::value::Map;

use super::{
    CreateTableRequest, DeleteItemRequest, GetItemRequest, ItemPage, PutItemRequest, QueryRequest,
    ScanRequest, StoreResult, TableDescription, UpdateItemRequest,
};

/// The underlying key-value/table store.
///
/// Implementations are thin adapters over a client; they must not retry and
/// must report failures as [`crate::StoreError`] without reinterpretation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Lists the names of every table, as reported by the store.
    async fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Fetches the full schema of a table.
    async fn describe_table(&self, table_name: &str) -> StoreResult<TableDescription>;

    /// Creates a table.
    async fn create_table(&self, request: &CreateTableRequest) -> StoreResult<()>;

    /// Deletes a table.
    async fn delete_table(&self, table_name: &str) -> StoreResult<()>;

    /// Gets an item by key, `None` when absent.
    async fn get_item(&self, request: &GetItemRequest) -> StoreResult<Option<Map>>;

    /// Writes an item, honouring any condition.
    async fn put_item(&self, request: &PutItemRequest) -> StoreResult<()>;

    /// Applies an update expression and returns the updated attributes.
    async fn update_item(&self, request: &UpdateItemRequest) -> StoreResult<Map>;

    /// Runs an indexed query.
    async fn query(&self, request: &QueryRequest) -> StoreResult<ItemPage>;

    /// Runs an unindexed, filtered scan.
    async fn scan(&self, request: &ScanRequest) -> StoreResult<ItemPage>;

    /// Deletes an item by key.
    async fn delete_item(&self, request: &DeleteItemRequest) -> StoreResult<()>;
}
