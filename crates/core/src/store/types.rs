//! Store-native request and response shapes.

use std::collections::HashMap;

use crate::schema::{BillingMode, ProvisionedThroughput};
use crate::value::Map;

/// Key role as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Hash,
    Range,
}

/// Attribute type as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarAttributeType {
    S,
    N,
    B,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: ScalarAttributeType,
}

/// Table status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// Full remote schema of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: Option<BillingMode>,
    pub status: TableStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableRequest {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: BillingMode,
    /// Only present for provisioned tables.
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Map,
    pub consistent_read: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Map,
    /// Legacy per-attribute actions. Stores reject these for puts.
    pub attribute_updates: Option<Map>,
    pub condition_expression: Option<String>,
    pub expression_attribute_values: Option<Map>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
}

/// Which attributes an update returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValues {
    AllNew,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: Map,
    pub update_expression: String,
    pub expression_attribute_values: Option<Map>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub key_condition_expression: String,
    pub expression_attribute_values: Option<Map>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub limit: Option<i32>,
    /// `false` returns the highest range keys first.
    pub scan_index_forward: Option<bool>,
    pub consistent_read: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table_name: String,
    pub filter_expression: Option<String>,
    pub expression_attribute_values: Option<Map>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub limit: Option<i32>,
    pub consistent_read: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Map,
}

/// One page of query or scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    pub items: Vec<Map>,
    pub count: i32,
    pub scanned_count: i32,
}
