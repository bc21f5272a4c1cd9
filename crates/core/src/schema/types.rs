//! Manifest types (pure data).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Role of an attribute in a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Hash,
    Range,
}

/// Scalar attribute types usable in key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Binary,
}

/// Billing mode for the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned,
}

/// Read/write capacity for provisioned tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl Default for ProvisionedThroughput {
    fn default() -> Self {
        Self {
            read_capacity_units: 1,
            write_capacity_units: 1,
        }
    }
}

/// A table manifest entry: the caller's declared schema for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub name: String,
    pub key: BTreeMap<String, KeyRole>,
    pub attributes: BTreeMap<String, ScalarType>,
    #[serde(default)]
    pub billing_mode: BillingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

impl TableDefinition {
    /// Starts a definition with no key and pay-per-request billing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: BTreeMap::new(),
            attributes: BTreeMap::new(),
            billing_mode: BillingMode::PayPerRequest,
            provisioned_throughput: None,
        }
    }

    /// Sets the hash key attribute.
    pub fn with_hash_key(self, name: &str, attribute_type: ScalarType) -> Self {
        self.with_key(name, KeyRole::Hash, attribute_type)
    }

    /// Sets the range key attribute.
    pub fn with_range_key(self, name: &str, attribute_type: ScalarType) -> Self {
        self.with_key(name, KeyRole::Range, attribute_type)
    }

    fn with_key(mut self, name: &str, role: KeyRole, attribute_type: ScalarType) -> Self {
        self.key.insert(name.to_string(), role);
        self.attributes.insert(name.to_string(), attribute_type);
        self
    }

    /// Uses provisioned billing with the given capacity.
    pub fn with_provisioned_throughput(mut self, read: i64, write: i64) -> Self {
        self.billing_mode = BillingMode::Provisioned;
        self.provisioned_throughput = Some(ProvisionedThroughput {
            read_capacity_units: read,
            write_capacity_units: write,
        });
        self
    }

    /// Checks the key invariants: exactly one hash attribute, at most one
    /// range attribute, and every key attribute declared in `attributes`.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::configuration("Table name must not be empty"));
        }

        let hash_count = self.key.values().filter(|r| **r == KeyRole::Hash).count();
        if hash_count != 1 {
            return Err(Error::configuration(format!(
                "Table '{}' must have exactly one hash key, found {}",
                self.name, hash_count
            )));
        }

        let range_count = self.key.values().filter(|r| **r == KeyRole::Range).count();
        if range_count > 1 {
            return Err(Error::configuration(format!(
                "Table '{}' must have at most one range key, found {}",
                self.name, range_count
            )));
        }

        if let Some(missing) = self.key.keys().find(|k| !self.attributes.contains_key(*k)) {
            return Err(Error::configuration(format!(
                "Table '{}' key attribute '{}' is not declared in attributes",
                self.name, missing
            )));
        }

        Ok(())
    }
}

/// Parses and validates a JSON manifest: an array of table definitions.
pub fn parse_manifest(json: &str) -> Result<Vec<TableDefinition>> {
    let manifest: Vec<TableDefinition> = serde_json::from_str(json)
        .map_err(|e| Error::configuration(format!("Invalid manifest: {e}")))?;

    for definition in &manifest {
        definition.validate()?;
    }

    Ok(manifest)
}

/// The in-memory view of a table once it is known to exist remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTable {
    pub name: String,
    /// Set iff the key has exactly one attribute, enabling bare-value keys.
    pub key_field: Option<String>,
    pub key: BTreeMap<String, KeyRole>,
    pub attributes: BTreeMap<String, ScalarType>,
}

impl From<&TableDefinition> for LocalTable {
    fn from(definition: &TableDefinition) -> Self {
        let key_field = match definition.key.len() {
            1 => definition.key.keys().next().cloned(),
            _ => None,
        };

        Self {
            name: definition.name.clone(),
            key_field,
            key: definition.key.clone(),
            attributes: definition.attributes.clone(),
        }
    }
}
