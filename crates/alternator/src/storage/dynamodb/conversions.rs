//! DynamoDB attribute and schema conversion functions.
//!
//! Pure functions for converting between SDK types and alternator's store
//! types. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{self as sdk, AttributeValue};

use alternator_core::schema::{BillingMode, ProvisionedThroughput};
use alternator_core::store::{
    AttributeDefinition, KeySchemaElement, KeyType, ScalarAttributeType, TableDescription,
    TableStatus,
};
use alternator_core::value::{Map, Value};
use alternator_core::StoreError;

// ============================================================================
// Values
// ============================================================================

/// Convert a value to a DynamoDB attribute.
pub fn value_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Binary(bytes) => AttributeValue::B(Blob::new(bytes.clone())),
        Value::List(items) => AttributeValue::L(items.iter().map(value_to_attribute).collect()),
        Value::Map(map) => AttributeValue::M(map_to_item(map)),
    }
}

/// Convert a DynamoDB attribute to a value. Sets become lists.
pub fn attribute_to_value(attribute: AttributeValue) -> Result<Value, StoreError> {
    Ok(match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::N(n) => parse_number(&n)?,
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::B(blob) => Value::Binary(blob.into_inner()),
        AttributeValue::L(items) => Value::List(
            items
                .into_iter()
                .map(attribute_to_value)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(item) => Value::Map(item_to_map(item)?),
        AttributeValue::Ss(strings) => Value::List(strings.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(numbers) => Value::List(
            numbers
                .iter()
                .map(|n| parse_number(n))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::Bs(blobs) => Value::List(
            blobs
                .into_iter()
                .map(|blob| Value::Binary(blob.into_inner()))
                .collect(),
        ),
        other => {
            return Err(StoreError::Service(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

fn parse_number(n: &str) -> Result<Value, StoreError> {
    n.parse::<serde_json::Number>()
        .map(Value::Number)
        .map_err(|_| StoreError::Service(format!("Invalid number attribute: {}", n)))
}

/// Convert a map to a DynamoDB item.
pub fn map_to_item(map: &Map) -> HashMap<String, AttributeValue> {
    map.iter()
        .map(|(name, value)| (name.to_string(), value_to_attribute(value)))
        .collect()
}

/// Convert a DynamoDB item to a map, with attributes sorted by name.
pub fn item_to_map(item: HashMap<String, AttributeValue>) -> Result<Map, StoreError> {
    let mut entries: Vec<(String, AttributeValue)> = item.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut map = Map::new();
    for (name, attribute) in entries {
        map.insert(name, attribute_to_value(attribute)?);
    }
    Ok(map)
}

/// Convert an optional map to an optional DynamoDB item.
pub fn optional_item(map: Option<&Map>) -> Option<HashMap<String, AttributeValue>> {
    map.map(map_to_item)
}

// ============================================================================
// Schema
// ============================================================================

pub fn key_schema_to_sdk(element: &KeySchemaElement) -> Result<sdk::KeySchemaElement, StoreError> {
    sdk::KeySchemaElement::builder()
        .attribute_name(&element.attribute_name)
        .key_type(match element.key_type {
            KeyType::Hash => sdk::KeyType::Hash,
            KeyType::Range => sdk::KeyType::Range,
        })
        .build()
        .map_err(|e| StoreError::Validation(e.to_string()))
}

pub fn attribute_definition_to_sdk(
    definition: &AttributeDefinition,
) -> Result<sdk::AttributeDefinition, StoreError> {
    sdk::AttributeDefinition::builder()
        .attribute_name(&definition.attribute_name)
        .attribute_type(match definition.attribute_type {
            ScalarAttributeType::S => sdk::ScalarAttributeType::S,
            ScalarAttributeType::N => sdk::ScalarAttributeType::N,
            ScalarAttributeType::B => sdk::ScalarAttributeType::B,
        })
        .build()
        .map_err(|e| StoreError::Validation(e.to_string()))
}

pub fn billing_mode_to_sdk(mode: BillingMode) -> sdk::BillingMode {
    match mode {
        BillingMode::PayPerRequest => sdk::BillingMode::PayPerRequest,
        BillingMode::Provisioned => sdk::BillingMode::Provisioned,
    }
}

pub fn throughput_to_sdk(
    throughput: &ProvisionedThroughput,
) -> Result<sdk::ProvisionedThroughput, StoreError> {
    sdk::ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()
        .map_err(|e| StoreError::Validation(e.to_string()))
}

/// Convert an SDK table description. Unknown key or attribute types are
/// reported as service errors.
pub fn table_description_from_sdk(
    table: &sdk::TableDescription,
) -> Result<TableDescription, StoreError> {
    let key_schema = table
        .key_schema()
        .iter()
        .map(|element| {
            let key_type = match element.key_type() {
                sdk::KeyType::Hash => KeyType::Hash,
                sdk::KeyType::Range => KeyType::Range,
                other => {
                    return Err(StoreError::Service(format!("Unknown key type: {}", other.as_str())))
                }
            };
            Ok(KeySchemaElement {
                attribute_name: element.attribute_name().to_string(),
                key_type,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let attribute_definitions = table
        .attribute_definitions()
        .iter()
        .map(|definition| {
            let attribute_type = match definition.attribute_type() {
                sdk::ScalarAttributeType::S => ScalarAttributeType::S,
                sdk::ScalarAttributeType::N => ScalarAttributeType::N,
                sdk::ScalarAttributeType::B => ScalarAttributeType::B,
                other => {
                    return Err(StoreError::Service(format!(
                        "Unknown attribute type: {}",
                        other.as_str()
                    )))
                }
            };
            Ok(AttributeDefinition {
                attribute_name: definition.attribute_name().to_string(),
                attribute_type,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let billing_mode = table
        .billing_mode_summary()
        .and_then(|summary| summary.billing_mode())
        .and_then(|mode| match mode {
            sdk::BillingMode::PayPerRequest => Some(BillingMode::PayPerRequest),
            sdk::BillingMode::Provisioned => Some(BillingMode::Provisioned),
            _ => None,
        });

    let status = match table.table_status() {
        Some(sdk::TableStatus::Creating) => TableStatus::Creating,
        Some(sdk::TableStatus::Updating) => TableStatus::Updating,
        Some(sdk::TableStatus::Deleting) => TableStatus::Deleting,
        _ => TableStatus::Active,
    };

    Ok(TableDescription {
        table_name: table.table_name().unwrap_or_default().to_string(),
        key_schema,
        attribute_definitions,
        billing_mode,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(value_to_attribute(&Value::Null), AttributeValue::Null(true));
        assert_eq!(
            value_to_attribute(&Value::from(42)),
            AttributeValue::N("42".to_string())
        );
        assert_eq!(
            value_to_attribute(&Value::from(1.5)),
            AttributeValue::N("1.5".to_string())
        );
        assert_eq!(
            value_to_attribute(&Value::Binary(vec![1, 2])),
            AttributeValue::B(Blob::new(vec![1, 2]))
        );
    }

    #[test]
    fn test_item_round_trip() {
        let map = Value::from(json!({
            "id": "abc",
            "age": 10,
            "tags": ["a", "b"],
            "profile": {"admin": true, "nickname": null}
        }))
        .into_map()
        .unwrap();

        let item = map_to_item(&map);
        assert_eq!(item.get("id"), Some(&AttributeValue::S("abc".to_string())));

        assert_eq!(item_to_map(item).unwrap(), map);
    }

    #[test]
    fn test_item_to_map_sorts_attributes() {
        let item = HashMap::from([
            ("z".to_string(), AttributeValue::S("1".to_string())),
            ("a".to_string(), AttributeValue::S("2".to_string())),
        ]);

        let map = item_to_map(item).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "z"]);
    }

    #[test]
    fn test_sets_become_lists() {
        let value = attribute_to_value(AttributeValue::Ns(vec!["1".to_string(), "2".to_string()]))
            .unwrap();

        assert_eq!(value, Value::from(json!([1, 2])));
    }

    #[test]
    fn test_invalid_number_fails() {
        let result = attribute_to_value(AttributeValue::N("not a number".to_string()));
        assert!(matches!(result, Err(StoreError::Service(_))));
    }

    #[test]
    fn test_table_description_from_sdk() {
        let table = sdk::TableDescription::builder()
            .table_name("users")
            .key_schema(
                sdk::KeySchemaElement::builder()
                    .attribute_name("name")
                    .key_type(sdk::KeyType::Hash)
                    .build()
                    .unwrap(),
            )
            .attribute_definitions(
                sdk::AttributeDefinition::builder()
                    .attribute_name("name")
                    .attribute_type(sdk::ScalarAttributeType::S)
                    .build()
                    .unwrap(),
            )
            .table_status(sdk::TableStatus::Active)
            .build();

        let description = table_description_from_sdk(&table).unwrap();

        assert_eq!(description.table_name, "users");
        assert_eq!(
            description.key_schema,
            vec![KeySchemaElement {
                attribute_name: "name".to_string(),
                key_type: KeyType::Hash,
            }]
        );
        assert_eq!(
            description.attribute_definitions,
            vec![AttributeDefinition {
                attribute_name: "name".to_string(),
                attribute_type: ScalarAttributeType::S,
            }]
        );
        assert_eq!(description.billing_mode, None);
        assert_eq!(description.status, TableStatus::Active);
    }
}
