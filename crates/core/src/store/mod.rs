mod traits;
mod types;

pub use traits::Store;
pub use types::{
    AttributeDefinition, CreateTableRequest, DeleteItemRequest, GetItemRequest, ItemPage,
    KeySchemaElement, KeyType, PutItemRequest, QueryRequest, ReturnValues, ScalarAttributeType,
    ScanRequest, TableDescription, TableStatus, UpdateItemRequest,
};

/// Result type for store calls.
pub type StoreResult<T> = std::result::Result<T, crate::error::StoreError>;
