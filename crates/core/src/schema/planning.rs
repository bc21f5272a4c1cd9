//! Pure functions for reconciling a manifest against the store (Functional Core).

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{Error, Result, SchemaPart};
use crate::store::{
    AttributeDefinition, CreateTableRequest, KeySchemaElement, KeyType, ScalarAttributeType,
    TableDescription,
};

use super::{BillingMode, KeyRole, ScalarType, TableDefinition};

/// A table name the store's listing call reports that is never a real table.
pub const LISTING_SENTINEL: &str = "table_name";

/// What reconciliation has to do for one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    /// No remote table with this name, it needs to be created.
    Create { definition: TableDefinition },
    /// A remote table exists and must match the definition.
    Verify {
        definition: TableDefinition,
        remote: TableDescription,
    },
}

impl SyncStep {
    pub fn definition(&self) -> &TableDefinition {
        match self {
            SyncStep::Create { definition } | SyncStep::Verify { definition, .. } => definition,
        }
    }
}

/// Drops names from a table listing that are not user tables.
pub fn filter_listed_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| name != LISTING_SENTINEL)
        .collect()
}

/// Pure function: pair every manifest entry with what needs to happen to it.
pub fn calculate_sync_plan(
    remote: &[TableDescription],
    manifest: &[TableDefinition],
) -> Vec<SyncStep> {
    let remote_by_name: HashMap<&str, &TableDescription> = remote
        .iter()
        .map(|table| (table.table_name.as_str(), table))
        .collect();

    manifest
        .iter()
        .map(|definition| match remote_by_name.get(definition.name.as_str()) {
            Some(remote) => SyncStep::Verify {
                definition: definition.clone(),
                remote: (*remote).clone(),
            },
            None => SyncStep::Create {
                definition: definition.clone(),
            },
        })
        .collect()
}

/// The remote key schema in manifest terms.
pub fn remote_key(remote: &TableDescription) -> BTreeMap<String, KeyRole> {
    remote
        .key_schema
        .iter()
        .map(|element| {
            let role = match element.key_type {
                KeyType::Hash => KeyRole::Hash,
                KeyType::Range => KeyRole::Range,
            };
            (element.attribute_name.clone(), role)
        })
        .collect()
}

/// The remote attribute definitions in manifest terms.
pub fn remote_attributes(remote: &TableDescription) -> BTreeMap<String, ScalarType> {
    remote
        .attribute_definitions
        .iter()
        .map(|definition| {
            let attribute_type = match definition.attribute_type {
                ScalarAttributeType::S => ScalarType::String,
                ScalarAttributeType::N => ScalarType::Number,
                ScalarAttributeType::B => ScalarType::Binary,
            };
            (definition.attribute_name.clone(), attribute_type)
        })
        .collect()
}

/// Compares a remote table against its manifest entry.
///
/// Key roles and attribute types must match exactly; anything else about the
/// remote table (billing, status) is ignored.
pub fn compare_table(remote: &TableDescription, definition: &TableDefinition) -> Result<()> {
    let key = remote_key(remote);
    if key != definition.key {
        return Err(mismatch(definition, SchemaPart::Key, &definition.key, &key));
    }

    let attributes = remote_attributes(remote);
    if attributes != definition.attributes {
        return Err(mismatch(
            definition,
            SchemaPart::Attributes,
            &definition.attributes,
            &attributes,
        ));
    }

    Ok(())
}

fn mismatch<T: Serialize>(
    definition: &TableDefinition,
    part: SchemaPart,
    local: &T,
    remote: &T,
) -> Error {
    Error::SchemaMismatch {
        table: definition.name.clone(),
        part,
        local: serde_json::to_string(local).unwrap_or_default(),
        remote: serde_json::to_string(remote).unwrap_or_default(),
    }
}

/// Pure function: the store call that creates a table from its definition.
///
/// The hash element always comes first in the key schema. Throughput is only
/// sent for provisioned tables and defaults to one read and one write unit.
pub fn create_table_request(definition: &TableDefinition) -> CreateTableRequest {
    let mut key_schema: Vec<KeySchemaElement> = definition
        .key
        .iter()
        .map(|(name, role)| KeySchemaElement {
            attribute_name: name.clone(),
            key_type: match role {
                KeyRole::Hash => KeyType::Hash,
                KeyRole::Range => KeyType::Range,
            },
        })
        .collect();
    key_schema.sort_by_key(|element| element.key_type == KeyType::Range);

    let attribute_definitions = definition
        .attributes
        .iter()
        .map(|(name, attribute_type)| AttributeDefinition {
            attribute_name: name.clone(),
            attribute_type: to_scalar_type(*attribute_type),
        })
        .collect();

    let provisioned_throughput = match definition.billing_mode {
        BillingMode::Provisioned => Some(definition.provisioned_throughput.unwrap_or_default()),
        BillingMode::PayPerRequest => None,
    };

    CreateTableRequest {
        table_name: definition.name.clone(),
        key_schema,
        attribute_definitions,
        billing_mode: definition.billing_mode,
        provisioned_throughput,
    }
}

fn to_scalar_type(attribute_type: ScalarType) -> ScalarAttributeType {
    match attribute_type {
        ScalarType::String => ScalarAttributeType::S,
        ScalarType::Number => ScalarAttributeType::N,
        ScalarType::Binary => ScalarAttributeType::B,
    }
}

/// Pure function: Format a sync plan for display.
pub fn format_sync_plan(plan: &[SyncStep]) -> Vec<String> {
    let mut lines = Vec::new();
    for step in plan {
        match step {
            SyncStep::Create { definition } => {
                let request = create_table_request(definition);
                lines.push(format!("+ Create table: {}", definition.name));
                for element in &request.key_schema {
                    let attribute_type = request
                        .attribute_definitions
                        .iter()
                        .find(|a| a.attribute_name == element.attribute_name)
                        .map(|a| format!("{:?}", a.attribute_type))
                        .unwrap_or_else(|| "?".to_string());
                    let label = match element.key_type {
                        KeyType::Hash => "Hash key",
                        KeyType::Range => "Range key",
                    };
                    lines.push(format!(
                        "  {}: {} ({})",
                        label, element.attribute_name, attribute_type
                    ));
                }
                match request.provisioned_throughput {
                    Some(throughput) => lines.push(format!(
                        "  Billing: PROVISIONED (read {}, write {})",
                        throughput.read_capacity_units, throughput.write_capacity_units
                    )),
                    None => lines.push("  Billing: PAY_PER_REQUEST".to_string()),
                }
            }
            SyncStep::Verify { definition, remote } => match compare_table(remote, definition) {
                Ok(()) => lines.push(format!("= Table '{}' is up to date", definition.name)),
                Err(error) => lines.push(format!("! {error}")),
            },
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProvisionedThroughput;
    use crate::store::TableStatus;

    fn test_definition() -> TableDefinition {
        TableDefinition::new("test").with_hash_key("id", ScalarType::String)
    }

    fn remote_table(name: &str, key: &[(&str, KeyType, ScalarAttributeType)]) -> TableDescription {
        TableDescription {
            table_name: name.to_string(),
            key_schema: key
                .iter()
                .map(|(attr, key_type, _)| KeySchemaElement {
                    attribute_name: attr.to_string(),
                    key_type: *key_type,
                })
                .collect(),
            attribute_definitions: key
                .iter()
                .map(|(attr, _, attribute_type)| AttributeDefinition {
                    attribute_name: attr.to_string(),
                    attribute_type: *attribute_type,
                })
                .collect(),
            billing_mode: Some(BillingMode::PayPerRequest),
            status: TableStatus::Active,
        }
    }

    #[test]
    fn test_filter_listed_names_drops_sentinel() {
        let names = vec![
            "users".to_string(),
            LISTING_SENTINEL.to_string(),
            "test".to_string(),
        ];

        assert_eq!(filter_listed_names(names), vec!["users", "test"]);
    }

    #[test]
    fn test_plan_creates_missing_table() {
        let plan = calculate_sync_plan(&[], &[test_definition()]);

        assert_eq!(
            plan,
            vec![SyncStep::Create {
                definition: test_definition()
            }]
        );
    }

    #[test]
    fn test_plan_verifies_existing_table() {
        let remote = remote_table("test", &[("id", KeyType::Hash, ScalarAttributeType::S)]);
        let other = remote_table("other", &[("pk", KeyType::Hash, ScalarAttributeType::S)]);

        let plan = calculate_sync_plan(&[other, remote.clone()], &[test_definition()]);

        assert_eq!(
            plan,
            vec![SyncStep::Verify {
                definition: test_definition(),
                remote
            }]
        );
    }

    #[test]
    fn test_compare_matching_table() {
        let remote = remote_table("test", &[("id", KeyType::Hash, ScalarAttributeType::S)]);
        assert!(compare_table(&remote, &test_definition()).is_ok());
    }

    #[test]
    fn test_compare_key_mismatch() {
        let remote = remote_table("test", &[("id", KeyType::Hash, ScalarAttributeType::S)]);
        let definition = test_definition().with_range_key("foo", ScalarType::Number);

        let error = compare_table(&remote, &definition).unwrap_err();
        assert_eq!(
            error,
            Error::SchemaMismatch {
                table: "test".to_string(),
                part: SchemaPart::Key,
                local: r#"{"foo":"range","id":"hash"}"#.to_string(),
                remote: r#"{"id":"hash"}"#.to_string(),
            }
        );
    }

    #[test]
    fn test_compare_attribute_type_mismatch() {
        let remote = remote_table("test", &[("id", KeyType::Hash, ScalarAttributeType::N)]);

        let error = compare_table(&remote, &test_definition()).unwrap_err();
        assert!(matches!(
            error,
            Error::SchemaMismatch {
                part: SchemaPart::Attributes,
                ..
            }
        ));
    }

    #[test]
    fn test_create_request_defaults_to_pay_per_request() {
        let request = create_table_request(&test_definition());

        assert_eq!(request.billing_mode, BillingMode::PayPerRequest);
        assert_eq!(request.provisioned_throughput, None);
        assert_eq!(
            request.attribute_definitions,
            vec![AttributeDefinition {
                attribute_name: "id".to_string(),
                attribute_type: ScalarAttributeType::S,
            }]
        );
    }

    #[test]
    fn test_create_request_puts_hash_key_first() {
        // "age" sorts before "id" but is the range key
        let definition = TableDefinition::new("test")
            .with_hash_key("id", ScalarType::String)
            .with_range_key("age", ScalarType::Number);

        let request = create_table_request(&definition);

        assert_eq!(request.key_schema[0].attribute_name, "id");
        assert_eq!(request.key_schema[0].key_type, KeyType::Hash);
        assert_eq!(request.key_schema[1].attribute_name, "age");
        assert_eq!(request.key_schema[1].key_type, KeyType::Range);
    }

    #[test]
    fn test_create_request_provisioned_defaults_to_one_unit() {
        let mut definition = test_definition();
        definition.billing_mode = BillingMode::Provisioned;

        let request = create_table_request(&definition);

        assert_eq!(
            request.provisioned_throughput,
            Some(ProvisionedThroughput {
                read_capacity_units: 1,
                write_capacity_units: 1
            })
        );
    }

    #[test]
    fn test_create_request_provisioned_uses_declared_capacity() {
        let definition = test_definition().with_provisioned_throughput(10, 4);

        let request = create_table_request(&definition);

        assert_eq!(request.billing_mode, BillingMode::Provisioned);
        assert_eq!(
            request.provisioned_throughput,
            Some(ProvisionedThroughput {
                read_capacity_units: 10,
                write_capacity_units: 4
            })
        );
    }

    #[test]
    fn test_format_sync_plan() {
        let remote = remote_table("users", &[("name", KeyType::Hash, ScalarAttributeType::S)]);
        let users = TableDefinition::new("users").with_hash_key("name", ScalarType::String);
        let plan = calculate_sync_plan(&[remote], &[test_definition(), users]);

        assert_eq!(
            format_sync_plan(&plan),
            vec![
                "+ Create table: test".to_string(),
                "  Hash key: id (S)".to_string(),
                "  Billing: PAY_PER_REQUEST".to_string(),
                "= Table 'users' is up to date".to_string(),
            ]
        );
    }
}
