//! DynamoDB store implementation.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::ReturnValue;
use aws_sdk_dynamodb::Client;

use alternator_core::store::{
    CreateTableRequest, DeleteItemRequest, GetItemRequest, ItemPage, PutItemRequest, QueryRequest,
    ReturnValues, ScanRequest, Store, StoreResult, TableDescription, UpdateItemRequest,
};
use alternator_core::value::Map;
use alternator_core::StoreError;

use crate::config::StoreConfig;

use super::conversions::{
    attribute_definition_to_sdk, billing_mode_to_sdk, item_to_map, key_schema_to_sdk,
    map_to_item, optional_item, table_description_from_sdk, throughput_to_sdk,
};
use super::error::map_sdk_error;

/// Creates a DynamoDB client with the given configuration.
pub async fn create_client(config: &StoreConfig) -> Client {
    let mut sdk_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        sdk_config_loader = sdk_config_loader.endpoint_url(endpoint);
    }

    let sdk_config = sdk_config_loader.load().await;
    Client::new(&sdk_config)
}

/// DynamoDB-backed store.
///
/// A thin adapter: every trait call is exactly one SDK call (listing pages
/// through all table names), with errors classified by `map_sdk_error`.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new store from environment configuration.
    ///
    /// Uses the AWS SDK default credential chain with `AWS_REGION` and
    /// `AWS_ENDPOINT_URL`, see [`StoreConfig::from_env`].
    pub async fn from_env() -> Self {
        Self::from_config(&StoreConfig::from_env()).await
    }

    pub async fn from_config(config: &StoreConfig) -> Self {
        Self::new(create_client(config).await)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let result = self
                .client
                .list_tables()
                .set_exclusive_start_table_name(start.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, "ListTables"))?;

            names.extend(result.table_names().iter().cloned());

            match result.last_evaluated_table_name() {
                Some(last) => start = Some(last.to_string()),
                None => break,
            }
        }

        Ok(names)
    }

    async fn describe_table(&self, table_name: &str) -> StoreResult<TableDescription> {
        let result = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "DescribeTable"))?;

        let table = result.table().ok_or_else(|| {
            StoreError::Service(format!("DescribeTable returned no table for {table_name}"))
        })?;
        table_description_from_sdk(table)
    }

    async fn create_table(&self, request: &CreateTableRequest) -> StoreResult<()> {
        let key_schema = request
            .key_schema
            .iter()
            .map(key_schema_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;
        let attribute_definitions = request
            .attribute_definitions
            .iter()
            .map(attribute_definition_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;
        let provisioned_throughput = request
            .provisioned_throughput
            .as_ref()
            .map(throughput_to_sdk)
            .transpose()?;

        self.client
            .create_table()
            .table_name(&request.table_name)
            .set_key_schema(Some(key_schema))
            .set_attribute_definitions(Some(attribute_definitions))
            .billing_mode(billing_mode_to_sdk(request.billing_mode))
            .set_provisioned_throughput(provisioned_throughput)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "CreateTable"))?;

        Ok(())
    }

    async fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.client
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "DeleteTable"))?;

        Ok(())
    }

    async fn get_item(&self, request: &GetItemRequest) -> StoreResult<Option<Map>> {
        let result = self
            .client
            .get_item()
            .table_name(&request.table_name)
            .set_key(Some(map_to_item(&request.key)))
            .set_consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "GetItem"))?;

        result.item.map(item_to_map).transpose()
    }

    async fn put_item(&self, request: &PutItemRequest) -> StoreResult<()> {
        if request.attribute_updates.is_some() {
            return Err(StoreError::Validation(
                "AttributeUpdates is not supported by PutItem".to_string(),
            ));
        }

        self.client
            .put_item()
            .table_name(&request.table_name)
            .set_item(Some(map_to_item(&request.item)))
            .set_condition_expression(request.condition_expression.clone())
            .set_expression_attribute_values(optional_item(
                request.expression_attribute_values.as_ref(),
            ))
            .set_expression_attribute_names(request.expression_attribute_names.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "PutItem"))?;

        Ok(())
    }

    async fn update_item(&self, request: &UpdateItemRequest) -> StoreResult<Map> {
        let return_values = match request.return_values {
            ReturnValues::AllNew => ReturnValue::AllNew,
        };

        let result = self
            .client
            .update_item()
            .table_name(&request.table_name)
            .set_key(Some(map_to_item(&request.key)))
            .update_expression(&request.update_expression)
            .set_expression_attribute_values(optional_item(
                request.expression_attribute_values.as_ref(),
            ))
            .set_expression_attribute_names(request.expression_attribute_names.clone())
            .return_values(return_values)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "UpdateItem"))?;

        Ok(result.attributes.map(item_to_map).transpose()?.unwrap_or_default())
    }

    async fn query(&self, request: &QueryRequest) -> StoreResult<ItemPage> {
        let result = self
            .client
            .query()
            .table_name(&request.table_name)
            .key_condition_expression(&request.key_condition_expression)
            .set_expression_attribute_values(optional_item(
                request.expression_attribute_values.as_ref(),
            ))
            .set_expression_attribute_names(request.expression_attribute_names.clone())
            .set_limit(request.limit)
            .set_scan_index_forward(request.scan_index_forward)
            .set_consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "Query"))?;

        Ok(ItemPage {
            items: result
                .items
                .unwrap_or_default()
                .into_iter()
                .map(item_to_map)
                .collect::<Result<_, _>>()?,
            count: result.count,
            scanned_count: result.scanned_count,
        })
    }

    async fn scan(&self, request: &ScanRequest) -> StoreResult<ItemPage> {
        let result = self
            .client
            .scan()
            .table_name(&request.table_name)
            .set_filter_expression(request.filter_expression.clone())
            .set_expression_attribute_values(optional_item(
                request.expression_attribute_values.as_ref(),
            ))
            .set_expression_attribute_names(request.expression_attribute_names.clone())
            .set_limit(request.limit)
            .set_consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "Scan"))?;

        Ok(ItemPage {
            items: result
                .items
                .unwrap_or_default()
                .into_iter()
                .map(item_to_map)
                .collect::<Result<_, _>>()?,
            count: result.count,
            scanned_count: result.scanned_count,
        })
    }

    async fn delete_item(&self, request: &DeleteItemRequest) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(&request.table_name)
            .set_key(Some(map_to_item(&request.key)))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "DeleteItem"))?;

        Ok(())
    }
}
