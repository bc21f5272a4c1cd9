//! Caller options and their normalization into a canonical shape.

use std::collections::HashMap;

use futures_util::future::try_join_all;

use crate::error::{Error, Result};
use crate::schema::LocalTable;
use crate::value::{resolve, Arg, Deferred, Map, Value};

/// The argument every table operation accepts: either a bare key or full
/// options.
#[derive(Debug, Clone)]
pub enum KeyArg {
    /// A key value. A scalar is placed under the table's single key field; a
    /// mapping is used as the complete key.
    Key(Arg),
    Options(Options),
}

impl From<Options> for KeyArg {
    fn from(options: Options) -> Self {
        KeyArg::Options(options)
    }
}

impl From<Deferred> for KeyArg {
    fn from(deferred: Deferred) -> Self {
        KeyArg::Key(Arg::Pending(deferred))
    }
}

impl From<Arg> for KeyArg {
    fn from(arg: Arg) -> Self {
        KeyArg::Key(arg)
    }
}

impl From<Value> for KeyArg {
    fn from(value: Value) -> Self {
        KeyArg::Key(value.into())
    }
}

impl From<&str> for KeyArg {
    fn from(s: &str) -> Self {
        KeyArg::Key(s.into())
    }
}

impl From<String> for KeyArg {
    fn from(s: String) -> Self {
        KeyArg::Key(s.into())
    }
}

impl From<i64> for KeyArg {
    fn from(n: i64) -> Self {
        KeyArg::Key(n.into())
    }
}

/// Caller-supplied operation options.
///
/// Every argument-typed field may contain deferred values at any depth.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub key: Option<Arg>,
    pub item: Option<Arg>,
    pub expression: Option<String>,
    pub attribute_values: Option<Arg>,
    pub attribute_names: Option<Arg>,
    pub limit: Option<i32>,
    pub forward: Option<bool>,
    pub consistent_read: Option<bool>,
    pub attribute_updates: Option<Arg>,
    pub condition_expression: Option<String>,
    pub condition_values: Option<Arg>,
    pub condition_names: Option<Arg>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<Arg>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn item(mut self, item: impl Into<Arg>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn attribute_values(mut self, values: impl Into<Arg>) -> Self {
        self.attribute_values = Some(values.into());
        self
    }

    pub fn attribute_names(mut self, names: impl Into<Arg>) -> Self {
        self.attribute_names = Some(names.into());
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn forward(mut self, forward: bool) -> Self {
        self.forward = Some(forward);
        self
    }

    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = Some(consistent_read);
        self
    }

    pub fn attribute_updates(mut self, updates: impl Into<Arg>) -> Self {
        self.attribute_updates = Some(updates.into());
        self
    }

    pub fn condition_expression(mut self, expression: impl Into<String>) -> Self {
        self.condition_expression = Some(expression.into());
        self
    }

    pub fn condition_values(mut self, values: impl Into<Arg>) -> Self {
        self.condition_values = Some(values.into());
        self
    }

    pub fn condition_names(mut self, names: impl Into<Arg>) -> Self {
        self.condition_names = Some(names.into());
        self
    }
}

/// Options after every deferred value has been resolved and the key coerced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions {
    pub key: Option<Map>,
    pub item: Option<Map>,
    pub expression: Option<String>,
    pub attribute_values: Option<Map>,
    pub attribute_names: Option<HashMap<String, String>>,
    pub limit: Option<i32>,
    pub forward: Option<bool>,
    pub consistent_read: Option<bool>,
    pub attribute_updates: Option<Map>,
    pub condition_expression: Option<String>,
    pub condition_values: Option<Map>,
    pub condition_names: Option<HashMap<String, String>>,
}

/// Resolves all deferred values in `arg` and shapes them for `table`.
pub async fn normalize(table: &LocalTable, arg: KeyArg) -> Result<ResolvedOptions> {
    match arg {
        KeyArg::Key(key) => {
            let key = resolve(key).await?;
            Ok(ResolvedOptions {
                key: Some(coerce_key(table, key)?),
                ..Default::default()
            })
        }
        KeyArg::Options(options) => normalize_options(table, options).await,
    }
}

async fn normalize_options(table: &LocalTable, options: Options) -> Result<ResolvedOptions> {
    let Options {
        key,
        item,
        expression,
        attribute_values,
        attribute_names,
        limit,
        forward,
        consistent_read,
        attribute_updates,
        condition_expression,
        condition_values,
        condition_names,
    } = options;

    let mut resolved = try_join_all(
        [
            key,
            item,
            attribute_values,
            attribute_names,
            attribute_updates,
            condition_values,
            condition_names,
        ]
        .into_iter()
        .map(resolve_optional),
    )
    .await?
    .into_iter();

    let mut next = || resolved.next().flatten();
    let key = next();
    let item = next();
    let attribute_values = next();
    let attribute_names = next();
    let attribute_updates = next();
    let condition_values = next();
    let condition_names = next();

    Ok(ResolvedOptions {
        key: key.map(|k| coerce_key(table, k)).transpose()?,
        item: item.map(|v| expect_map("item", v)).transpose()?,
        expression,
        attribute_values: attribute_values
            .map(|v| expect_map("attributeValues", v))
            .transpose()?,
        attribute_names: attribute_names
            .map(|v| expect_names("attributeNames", v))
            .transpose()?,
        limit,
        forward,
        consistent_read,
        attribute_updates: attribute_updates
            .map(|v| expect_map("attributeUpdates", v))
            .transpose()?,
        condition_expression,
        condition_values: condition_values
            .map(|v| expect_map("conditionValues", v))
            .transpose()?,
        condition_names: condition_names
            .map(|v| expect_names("conditionNames", v))
            .transpose()?,
    })
}

async fn resolve_optional(arg: Option<Arg>) -> Result<Option<Value>> {
    match arg {
        Some(arg) => resolve(arg).await.map(Some),
        None => Ok(None),
    }
}

/// Turns a resolved key value into a key mapping.
///
/// A mapping is the full key. Any other structured value is rejected; a
/// scalar needs a single-attribute key.
fn coerce_key(table: &LocalTable, key: Value) -> Result<Map> {
    match key {
        Value::Map(map) => Ok(map),
        other if other.is_structured() => Err(Error::configuration(format!(
            "Key for table '{}' must be a mapping or a scalar, got {}",
            table.name,
            other.kind()
        ))),
        scalar => match &table.key_field {
            Some(field) => {
                let mut map = Map::new();
                map.insert(field.clone(), scalar);
                Ok(map)
            }
            None => Err(Error::configuration(format!(
                "Could not construct complex key for table '{}' from {}",
                table.name, scalar
            ))),
        },
    }
}

fn expect_map(field: &str, value: Value) -> Result<Map> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(Error::configuration(format!(
            "{field} must be a mapping, got {}",
            other.kind()
        ))),
    }
}

fn expect_names(field: &str, value: Value) -> Result<HashMap<String, String>> {
    expect_map(field, value)?
        .into_iter()
        .map(|(placeholder, name)| match name {
            Value::String(name) => Ok((placeholder, name)),
            other => Err(Error::configuration(format!(
                "{field} entry '{placeholder}' must be a string, got {}",
                other.kind()
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ScalarType, TableDefinition};
    use serde_json::json;

    fn single_key_table() -> LocalTable {
        LocalTable::from(&TableDefinition::new("test").with_hash_key("id", ScalarType::String))
    }

    fn composite_key_table() -> LocalTable {
        LocalTable::from(
            &TableDefinition::new("users")
                .with_hash_key("name", ScalarType::String)
                .with_range_key("version", ScalarType::Number),
        )
    }

    #[tokio::test]
    async fn test_scalar_key_on_single_key_table() {
        let options = normalize(&single_key_table(), "abc".into()).await.unwrap();

        assert_eq!(
            options,
            ResolvedOptions {
                key: Some(Value::from(json!({"id": "abc"})).into_map().unwrap()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_scalar_key_on_composite_table_fails() {
        let result = normalize(&composite_key_table(), "bob".into()).await;

        assert_eq!(
            result,
            Err(Error::configuration(
                "Could not construct complex key for table 'users' from \"bob\""
            ))
        );
    }

    #[tokio::test]
    async fn test_list_key_is_rejected() {
        let key = Arg::from(json!(["a", "b"]));

        let single = normalize(&single_key_table(), key.clone().into()).await;
        let composite = normalize(&composite_key_table(), key.into()).await;

        assert_eq!(
            single,
            Err(Error::configuration(
                "Key for table 'test' must be a mapping or a scalar, got list"
            ))
        );
        assert_eq!(
            composite,
            Err(Error::configuration(
                "Key for table 'users' must be a mapping or a scalar, got list"
            ))
        );
    }

    #[tokio::test]
    async fn test_deferred_scalar_key_is_coerced() {
        let created = Deferred::ready(json!({"id": "abc", "foo": "bar"}));

        let options = normalize(&single_key_table(), created.get("id").into())
            .await
            .unwrap();

        assert_eq!(
            options.key,
            Some(Value::from(json!({"id": "abc"})).into_map().unwrap())
        );
    }

    #[tokio::test]
    async fn test_mapping_key_is_used_as_is() {
        let key = Arg::from(json!({"name": "bob", "version": 3}));

        let options = normalize(&composite_key_table(), key.into()).await.unwrap();

        assert_eq!(
            options.key,
            Some(Value::from(json!({"name": "bob", "version": 3})).into_map().unwrap())
        );
    }

    #[tokio::test]
    async fn test_options_key_scalar_is_coerced() {
        let options = Options::new()
            .key(Deferred::ready("abc"))
            .item(json!({"foo": "baz"}));

        let resolved = normalize(&single_key_table(), options.into()).await.unwrap();

        assert_eq!(
            resolved.key,
            Some(Value::from(json!({"id": "abc"})).into_map().unwrap())
        );
        assert_eq!(
            resolved.item,
            Some(Value::from(json!({"foo": "baz"})).into_map().unwrap())
        );
    }

    #[tokio::test]
    async fn test_options_key_scalar_on_composite_table_fails() {
        let options = Options::new().key("bob");

        let result = normalize(&composite_key_table(), options.into()).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_nested_deferreds_in_options_are_resolved() {
        let id = Deferred::ready("abc");
        let options = Options::new()
            .expression("id = :id AND age > :min")
            .attribute_values(Arg::mapping([
                (":id", Arg::from(id)),
                (":min", Arg::from(15)),
            ]))
            .attribute_names(json!({"#name": "name"}))
            .limit(1)
            .forward(false);

        let resolved = normalize(&single_key_table(), options.into()).await.unwrap();

        assert_eq!(resolved.key, None);
        assert_eq!(
            resolved.attribute_values,
            Some(Value::from(json!({":id": "abc", ":min": 15})).into_map().unwrap())
        );
        assert_eq!(
            resolved.attribute_names,
            Some(HashMap::from([("#name".to_string(), "name".to_string())]))
        );
        assert_eq!(resolved.limit, Some(1));
        assert_eq!(resolved.forward, Some(false));
    }

    #[tokio::test]
    async fn test_failed_deferred_fails_normalization() {
        let options = Options::new().item(Arg::mapping([(
            "id",
            Arg::from(Deferred::failed(Error::configuration("no id"))),
        )]));

        let result = normalize(&single_key_table(), options.into()).await;
        assert_eq!(result, Err(Error::configuration("no id")));
    }

    #[tokio::test]
    async fn test_non_string_attribute_name_is_rejected() {
        let options = Options::new().attribute_names(json!({"#name": 1}));

        let result = normalize(&single_key_table(), options.into()).await;
        assert_eq!(
            result,
            Err(Error::configuration(
                "attributeNames entry '#name' must be a string, got number"
            ))
        );
    }

    #[tokio::test]
    async fn test_scalar_item_is_rejected() {
        let options = Options::new().item("not a map");

        let result = normalize(&single_key_table(), options.into()).await;
        assert_eq!(
            result,
            Err(Error::configuration("item must be a mapping, got string"))
        );
    }
}
