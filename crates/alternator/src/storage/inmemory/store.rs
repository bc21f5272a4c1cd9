//! In-memory store implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use alternator_core::store::{
    AttributeDefinition, CreateTableRequest, DeleteItemRequest, GetItemRequest, ItemPage, KeyType,
    PutItemRequest, QueryRequest, ScalarAttributeType, ScanRequest, Store, StoreResult,
    TableDescription, TableStatus, UpdateItemRequest,
};
use alternator_core::value::{Map, Value};
use alternator_core::StoreError;

use super::expression::{order, parse_condition, parse_update, values_equal, Scope};

/// A store call, as recorded by [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListTables,
    DescribeTable(String),
    CreateTable(String),
    DeleteTable(String),
    GetItem(String),
    PutItem(String),
    UpdateItem(String),
    Query(String),
    Scan(String),
    DeleteItem(String),
}

impl StoreCall {
    /// Whether this call reads or writes items, as opposed to managing tables.
    pub fn is_item_call(&self) -> bool {
        !matches!(
            self,
            StoreCall::ListTables
                | StoreCall::DescribeTable(_)
                | StoreCall::CreateTable(_)
                | StoreCall::DeleteTable(_)
        )
    }
}

#[derive(Debug, Clone)]
struct Table {
    description: TableDescription,
    /// Items in insertion order; scans return them in this order.
    items: Vec<Map>,
}

impl Table {
    fn key_attributes(&self) -> impl Iterator<Item = &str> {
        self.description
            .key_schema
            .iter()
            .map(|element| element.attribute_name.as_str())
    }

    fn range_key(&self) -> Option<&str> {
        self.description
            .key_schema
            .iter()
            .find(|element| element.key_type == KeyType::Range)
            .map(|element| element.attribute_name.as_str())
    }

    fn attribute_type(&self, name: &str) -> Option<ScalarAttributeType> {
        self.description
            .attribute_definitions
            .iter()
            .find(|definition| definition.attribute_name == name)
            .map(|definition| definition.attribute_type)
    }

    /// Checks that `key` holds exactly the key attributes, with declared types.
    fn validate_key(&self, key: &Map) -> StoreResult<()> {
        if key.len() != self.description.key_schema.len() {
            return Err(key_mismatch());
        }
        self.validate_key_attributes(key)
    }

    /// Checks that `item` holds every key attribute, with declared types.
    fn validate_key_attributes(&self, item: &Map) -> StoreResult<()> {
        for name in self.key_attributes() {
            let value = item.get(name).ok_or_else(key_mismatch)?;
            let matches_type = matches!(
                (self.attribute_type(name), value),
                (Some(ScalarAttributeType::S), Value::String(_))
                    | (Some(ScalarAttributeType::N), Value::Number(_))
                    | (Some(ScalarAttributeType::B), Value::Binary(_))
            );
            if !matches_type {
                return Err(key_mismatch());
            }
        }
        Ok(())
    }

    fn position(&self, key: &Map) -> Option<usize> {
        self.items.iter().position(|item| {
            self.key_attributes().all(|name| {
                item.get(name)
                    .zip(key.get(name))
                    .is_some_and(|(stored, wanted)| values_equal(stored, wanted))
            })
        })
    }

    fn key_of(&self, item: &Map) -> Map {
        self.key_attributes()
            .filter_map(|name| item.get(name).map(|value| (name, value.clone())))
            .collect()
    }
}

fn key_mismatch() -> StoreError {
    StoreError::Validation("The provided key element does not match the schema".to_string())
}

fn table_not_found(name: &str) -> StoreError {
    StoreError::ResourceNotFound(format!(
        "Requested resource not found: Table: {name} not found"
    ))
}

fn page_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// In-memory store for testing and local runs.
///
/// Tables live in an `Arc<RwLock<_>>` and are lost when the last clone is
/// dropped. Every call is recorded, in order, and can be inspected with
/// [`InMemoryStore::calls`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    /// Forgets the recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, call: StoreCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        self.record(StoreCall::ListTables).await;
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_table(&self, table_name: &str) -> StoreResult<TableDescription> {
        self.record(StoreCall::DescribeTable(table_name.to_string())).await;
        let tables = self.tables.read().await;
        tables
            .get(table_name)
            .map(|table| table.description.clone())
            .ok_or_else(|| table_not_found(table_name))
    }

    async fn create_table(&self, request: &CreateTableRequest) -> StoreResult<()> {
        self.record(StoreCall::CreateTable(request.table_name.clone())).await;
        let mut tables = self.tables.write().await;
        if tables.contains_key(&request.table_name) {
            return Err(StoreError::ResourceInUse(format!(
                "Table already exists: {}",
                request.table_name
            )));
        }

        for element in &request.key_schema {
            let declared = request
                .attribute_definitions
                .iter()
                .any(|definition: &AttributeDefinition| definition.attribute_name == element.attribute_name);
            if !declared {
                return Err(StoreError::Validation(format!(
                    "Key attribute {} is not defined in attribute definitions",
                    element.attribute_name
                )));
            }
        }

        tables.insert(
            request.table_name.clone(),
            Table {
                description: TableDescription {
                    table_name: request.table_name.clone(),
                    key_schema: request.key_schema.clone(),
                    attribute_definitions: request.attribute_definitions.clone(),
                    billing_mode: Some(request.billing_mode),
                    status: TableStatus::Active,
                },
                items: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.record(StoreCall::DeleteTable(table_name.to_string())).await;
        let mut tables = self.tables.write().await;
        tables
            .remove(table_name)
            .map(|_| ())
            .ok_or_else(|| table_not_found(table_name))
    }

    async fn get_item(&self, request: &GetItemRequest) -> StoreResult<Option<Map>> {
        self.record(StoreCall::GetItem(request.table_name.clone())).await;
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| table_not_found(&request.table_name))?;

        table.validate_key(&request.key)?;
        Ok(table
            .position(&request.key)
            .map(|index| table.items[index].clone()))
    }

    async fn put_item(&self, request: &PutItemRequest) -> StoreResult<()> {
        self.record(StoreCall::PutItem(request.table_name.clone())).await;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| table_not_found(&request.table_name))?;

        if request.attribute_updates.is_some() {
            return Err(StoreError::Validation(
                "AttributeUpdates is not supported by PutItem".to_string(),
            ));
        }
        table.validate_key_attributes(&request.item)?;

        let key = table.key_of(&request.item);
        let existing = table.position(&key);

        if let Some(condition) = &request.condition_expression {
            let condition = parse_condition(condition)?;
            let empty = Map::new();
            let current = existing.map(|index| &table.items[index]).unwrap_or(&empty);
            let scope = Scope::new(
                request.expression_attribute_names.as_ref(),
                request.expression_attribute_values.as_ref(),
            );
            if !scope.evaluate(&condition, current)? {
                return Err(StoreError::ConditionalCheckFailed(
                    "The conditional request failed".to_string(),
                ));
            }
        }

        match existing {
            Some(index) => table.items[index] = request.item.clone(),
            None => table.items.push(request.item.clone()),
        }
        Ok(())
    }

    async fn update_item(&self, request: &UpdateItemRequest) -> StoreResult<Map> {
        self.record(StoreCall::UpdateItem(request.table_name.clone())).await;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| table_not_found(&request.table_name))?;

        table.validate_key(&request.key)?;

        let update = parse_update(&request.update_expression)?;
        let scope = Scope::new(
            request.expression_attribute_names.as_ref(),
            request.expression_attribute_values.as_ref(),
        );

        for path in update.paths() {
            let name = scope.attribute_name(path)?;
            if table.key_attributes().any(|key| key == name) {
                return Err(StoreError::Validation(format!(
                    "Cannot update attribute {name}. This attribute is part of the key"
                )));
            }
        }

        let existing = table.position(&request.key);
        let current = match existing {
            Some(index) => table.items[index].clone(),
            None => request.key.clone(),
        };
        let updated = scope.apply(&update, &current)?;

        match existing {
            Some(index) => table.items[index] = updated.clone(),
            None => table.items.push(updated.clone()),
        }
        Ok(updated)
    }

    /// Evaluates the key condition against every item, then orders by range
    /// key.
    async fn query(&self, request: &QueryRequest) -> StoreResult<ItemPage> {
        self.record(StoreCall::Query(request.table_name.clone())).await;
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| table_not_found(&request.table_name))?;

        let condition = parse_condition(&request.key_condition_expression)?;
        let scope = Scope::new(
            request.expression_attribute_names.as_ref(),
            request.expression_attribute_values.as_ref(),
        );

        let mut items = Vec::new();
        for item in &table.items {
            if scope.evaluate(&condition, item)? {
                items.push(item.clone());
            }
        }

        if let Some(range_key) = table.range_key() {
            items.sort_by(|a, b| match (a.get(range_key), b.get(range_key)) {
                (Some(a), Some(b)) => order(a, b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
        }
        if request.scan_index_forward == Some(false) {
            items.reverse();
        }

        if let Some(limit) = request.limit.and_then(|l| usize::try_from(l.max(0)).ok()) {
            items.truncate(limit);
        }

        Ok(ItemPage {
            count: page_len(items.len()),
            scanned_count: page_len(items.len()),
            items,
        })
    }

    /// Reads up to `limit` items, then filters them.
    async fn scan(&self, request: &ScanRequest) -> StoreResult<ItemPage> {
        self.record(StoreCall::Scan(request.table_name.clone())).await;
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| table_not_found(&request.table_name))?;

        let limit = request
            .limit
            .and_then(|l| usize::try_from(l.max(0)).ok())
            .unwrap_or(usize::MAX);
        let scanned: Vec<&Map> = table.items.iter().take(limit).collect();

        let filter = request
            .filter_expression
            .as_deref()
            .map(parse_condition)
            .transpose()?;
        let scope = Scope::new(
            request.expression_attribute_names.as_ref(),
            request.expression_attribute_values.as_ref(),
        );

        let mut items = Vec::new();
        for item in &scanned {
            let keep = match &filter {
                Some(condition) => scope.evaluate(condition, item)?,
                None => true,
            };
            if keep {
                items.push((*item).clone());
            }
        }

        Ok(ItemPage {
            count: page_len(items.len()),
            scanned_count: page_len(scanned.len()),
            items,
        })
    }

    async fn delete_item(&self, request: &DeleteItemRequest) -> StoreResult<()> {
        self.record(StoreCall::DeleteItem(request.table_name.clone())).await;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| table_not_found(&request.table_name))?;

        table.validate_key(&request.key)?;
        if let Some(index) = table.position(&request.key) {
            table.items.remove(index);
        }
        Ok(())
    }
}
