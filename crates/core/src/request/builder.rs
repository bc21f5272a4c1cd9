//! Per-operation translation of canonical options into store requests.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::LocalTable;
use crate::store::{
    DeleteItemRequest, GetItemRequest, ItemPage, PutItemRequest, QueryRequest, ReturnValues,
    ScanRequest, UpdateItemRequest,
};
use crate::value::Map;

use super::{QueryResult, ResolvedOptions};

pub fn build_get(table: &LocalTable, options: ResolvedOptions) -> Result<GetItemRequest> {
    Ok(GetItemRequest {
        table_name: table.name.clone(),
        key: require(options.key, "get", "key")?,
        consistent_read: options.consistent_read,
    })
}

pub fn build_put(table: &LocalTable, options: ResolvedOptions) -> Result<PutItemRequest> {
    Ok(PutItemRequest {
        table_name: table.name.clone(),
        item: require(options.item, "create", "item")?,
        attribute_updates: options.attribute_updates,
        condition_expression: options.condition_expression,
        expression_attribute_values: options.condition_values,
        expression_attribute_names: options.condition_names,
    })
}

/// Builds an update. Without an explicit expression, one is synthesised from
/// `item`, see [`update_expression_for`].
pub fn build_update(table: &LocalTable, options: ResolvedOptions) -> Result<UpdateItemRequest> {
    let key = require(options.key, "update", "key")?;

    let (update_expression, names, values) = match options.expression {
        Some(expression) => (
            expression,
            options.attribute_names,
            options.attribute_values,
        ),
        None => {
            let item = require(options.item, "update", "item or expression")?;
            let (expression, names, values) = update_expression_for(&item)?;
            (expression, Some(names), Some(values))
        }
    };

    Ok(UpdateItemRequest {
        table_name: table.name.clone(),
        key,
        update_expression,
        expression_attribute_values: values,
        expression_attribute_names: names,
        return_values: ReturnValues::AllNew,
    })
}

/// Synthesises `SET #a = :a, #b = :b` with its name and value maps.
pub fn update_expression_for(item: &Map) -> Result<(String, HashMap<String, String>, Map)> {
    if item.is_empty() {
        return Err(Error::configuration(
            "Cannot build an update expression from an empty item",
        ));
    }

    let mut terms = Vec::with_capacity(item.len());
    let mut names = HashMap::with_capacity(item.len());
    let mut values = Map::new();

    for (field, value) in item.iter() {
        terms.push(format!("#{field} = :{field}"));
        names.insert(format!("#{field}"), field.to_string());
        values.insert(format!(":{field}"), value.clone());
    }

    Ok((format!("SET {}", terms.join(", ")), names, values))
}

pub fn build_query(table: &LocalTable, options: ResolvedOptions) -> Result<QueryRequest> {
    Ok(QueryRequest {
        table_name: table.name.clone(),
        key_condition_expression: require(options.expression, "findAll", "expression")?,
        expression_attribute_values: options.attribute_values,
        expression_attribute_names: options.attribute_names,
        limit: options.limit,
        scan_index_forward: options.forward,
        consistent_read: options.consistent_read,
    })
}

pub fn build_scan(table: &LocalTable, options: ResolvedOptions) -> ScanRequest {
    ScanRequest {
        table_name: table.name.clone(),
        filter_expression: options.expression,
        expression_attribute_values: options.attribute_values,
        expression_attribute_names: options.attribute_names,
        limit: options.limit,
        consistent_read: options.consistent_read,
    }
}

pub fn build_delete(table: &LocalTable, options: ResolvedOptions) -> Result<DeleteItemRequest> {
    Ok(DeleteItemRequest {
        table_name: table.name.clone(),
        key: require(options.key, "remove", "key")?,
    })
}

/// Projects a store page into the findAll/scan result shape.
pub fn project_page(page: ItemPage) -> QueryResult {
    QueryResult {
        count: page.count,
        rows: page.items,
        scanned_count: page.scanned_count,
    }
}

fn require<T>(value: Option<T>, operation: &str, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::configuration(format!("{operation} requires {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ScalarType, TableDefinition};
    use crate::value::Value;
    use serde_json::json;

    fn table() -> LocalTable {
        LocalTable::from(&TableDefinition::new("test").with_hash_key("id", ScalarType::String))
    }

    fn map(json: serde_json::Value) -> Map {
        Value::from(json).into_map().unwrap()
    }

    #[test]
    fn test_update_expression_from_item() {
        let (expression, names, values) =
            update_expression_for(&map(json!({"foo": "baz", "count": 2}))).unwrap();

        assert_eq!(expression, "SET #foo = :foo, #count = :count");
        assert_eq!(
            names,
            HashMap::from([
                ("#foo".to_string(), "foo".to_string()),
                ("#count".to_string(), "count".to_string()),
            ])
        );
        assert_eq!(values, map(json!({":foo": "baz", ":count": 2})));
    }

    #[test]
    fn test_update_expression_from_empty_item_fails() {
        assert!(matches!(
            update_expression_for(&Map::new()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_build_update_synthesises_expression() {
        let options = ResolvedOptions {
            key: Some(map(json!({"id": "abc"}))),
            item: Some(map(json!({"foo": "baz"}))),
            ..Default::default()
        };

        let request = build_update(&table(), options).unwrap();

        assert_eq!(request.table_name, "test");
        assert_eq!(request.update_expression, "SET #foo = :foo");
        assert_eq!(
            request.expression_attribute_values,
            Some(map(json!({":foo": "baz"})))
        );
        assert_eq!(request.return_values, ReturnValues::AllNew);
    }

    #[test]
    fn test_build_update_keeps_explicit_expression() {
        let options = ResolvedOptions {
            key: Some(map(json!({"id": "abc"}))),
            item: Some(map(json!({"ignored": true}))),
            expression: Some("SET #n = #n + :one".to_string()),
            attribute_names: Some(HashMap::from([("#n".to_string(), "n".to_string())])),
            attribute_values: Some(map(json!({":one": 1}))),
            ..Default::default()
        };

        let request = build_update(&table(), options).unwrap();

        assert_eq!(request.update_expression, "SET #n = #n + :one");
        assert_eq!(
            request.expression_attribute_values,
            Some(map(json!({":one": 1})))
        );
    }

    #[test]
    fn test_build_update_requires_key() {
        let options = ResolvedOptions {
            item: Some(map(json!({"foo": "baz"}))),
            ..Default::default()
        };

        assert_eq!(
            build_update(&table(), options),
            Err(Error::configuration("update requires key"))
        );
    }

    #[test]
    fn test_build_get_requires_key() {
        assert_eq!(
            build_get(&table(), ResolvedOptions::default()),
            Err(Error::configuration("get requires key"))
        );
    }

    #[test]
    fn test_build_put_maps_condition_fields() {
        let options = ResolvedOptions {
            item: Some(map(json!({"id": "abc"}))),
            condition_expression: Some("attribute_not_exists(#id)".to_string()),
            condition_names: Some(HashMap::from([("#id".to_string(), "id".to_string())])),
            ..Default::default()
        };

        let request = build_put(&table(), options).unwrap();

        assert_eq!(request.item, map(json!({"id": "abc"})));
        assert_eq!(
            request.condition_expression.as_deref(),
            Some("attribute_not_exists(#id)")
        );
        assert_eq!(request.expression_attribute_values, None);
    }

    #[test]
    fn test_build_query_requires_expression() {
        assert_eq!(
            build_query(&table(), ResolvedOptions::default()),
            Err(Error::configuration("findAll requires expression"))
        );
    }

    #[test]
    fn test_build_query_maps_direction_and_limit() {
        let options = ResolvedOptions {
            expression: Some("#name = :name".to_string()),
            limit: Some(1),
            forward: Some(false),
            ..Default::default()
        };

        let request = build_query(&table(), options).unwrap();

        assert_eq!(request.key_condition_expression, "#name = :name");
        assert_eq!(request.limit, Some(1));
        assert_eq!(request.scan_index_forward, Some(false));
    }

    #[test]
    fn test_project_page() {
        let page = ItemPage {
            items: vec![map(json!({"id": "a"}))],
            count: 1,
            scanned_count: 3,
        };

        let result = project_page(page);

        assert_eq!(result.count, 1);
        assert_eq!(result.scanned_count, 3);
        assert_eq!(result.rows, vec![map(json!({"id": "a"}))]);
    }
}
