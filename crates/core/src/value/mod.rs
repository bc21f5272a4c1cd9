//! Document values and deferred arguments.
//!
//! [`Value`] is a fully resolved document value. [`Arg`] is what callers hand
//! to operations: a value that may still contain [`Deferred`] leaves anywhere
//! inside it. [`resolve`] turns the latter into the former.

mod deferred;
mod resolve;

use std::fmt;

use serde_json::Number;

pub use deferred::Deferred;
pub use resolve::resolve;

/// A resolved document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Map(Map),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().and_then(Number::as_f64)
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this value is a mapping or a list.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_))
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Renders the value as JSON. Binary values become arrays of bytes.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Binary(bytes) => serde_json::Value::Array(
                bytes
                    .iter()
                    .map(|b| serde_json::Value::Number((*b).into()))
                    .collect(),
            ),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => map.to_json(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// An insertion-ordered map of attribute names to values.
///
/// Equality ignores ordering: two maps are equal when they hold the same keys
/// with equal values.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing (in place) and returning any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A possibly-deferred operation argument.
///
/// Deferred leaves may appear at any depth; [`resolve`] replaces each of them
/// with the value it eventually produces.
#[derive(Clone)]
pub enum Arg {
    Scalar(Value),
    Sequence(Vec<Arg>),
    Mapping(Vec<(String, Arg)>),
    Pending(Deferred),
}

impl Arg {
    /// Builds a mapping argument from `(name, arg)` pairs, keeping their order.
    pub fn mapping<K, A, I>(entries: I) -> Self
    where
        K: Into<String>,
        A: Into<Arg>,
        I: IntoIterator<Item = (K, A)>,
    {
        Arg::Mapping(
            entries
                .into_iter()
                .map(|(k, a)| (k.into(), a.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Arg::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Arg::Mapping(entries) => f.debug_tuple("Mapping").field(entries).finish(),
            Arg::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::List(items) => Arg::Sequence(items.into_iter().map(Arg::from).collect()),
            Value::Map(map) => Arg::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            scalar => Arg::Scalar(scalar),
        }
    }
}

impl From<Map> for Arg {
    fn from(map: Map) -> Self {
        Value::Map(map).into()
    }
}

impl From<Deferred> for Arg {
    fn from(deferred: Deferred) -> Self {
        Arg::Pending(deferred)
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::Sequence(items)
    }
}

impl From<()> for Arg {
    fn from(_: ()) -> Self {
        Arg::Scalar(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(object) => Value::Map(object.into_iter().collect()),
        }
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

macro_rules! value_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n.into())
                }
            }
        )*
    };
}

value_from_integer!(i32, i64, u32, u64);

macro_rules! arg_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Value::from(v).into()
                }
            }
        )*
    };
}

arg_from_value!(
    serde_json::Value,
    &str,
    String,
    bool,
    f64,
    i32,
    i64,
    u32,
    u64,
    Vec<u8>
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_equality_ignores_order() {
        let a: Map = [("id", Value::from("1")), ("foo", Value::from("bar"))]
            .into_iter()
            .collect();
        let b: Map = [("foo", Value::from("bar")), ("id", Value::from("1"))]
            .into_iter()
            .collect();

        assert_eq!(a, b);
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["id", "foo"]);
    }

    #[test]
    fn test_map_insert_replaces_in_place() {
        let mut map = Map::new();
        map.insert("a", 1);
        map.insert("b", 2);

        assert_eq!(map.insert("a", 3), Some(Value::from(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::from(3)));
    }

    #[test]
    fn test_from_json_preserves_object_order() {
        let value = Value::from(json!({"z": 1, "a": {"c": true, "b": null}}));
        let map = value.as_map().unwrap();

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        let nested = map.get("a").and_then(Value::as_map).unwrap();
        assert_eq!(nested.keys().collect::<Vec<_>>(), vec!["c", "b"]);
    }

    #[test]
    fn test_display_renders_json() {
        let value = Value::from(json!({"id": "abc", "age": 10}));
        assert_eq!(value.to_string(), r#"{"id":"abc","age":10}"#);
    }

    #[test]
    fn test_arg_from_value_is_structural() {
        let arg = Arg::from(json!({"id": "abc", "tags": ["a", "b"]}));

        match arg {
            Arg::Mapping(entries) => {
                assert_eq!(entries[0].0, "id");
                assert!(matches!(entries[1].1, Arg::Sequence(ref items) if items.len() == 2));
            }
            other => panic!("expected mapping, got {other:?}"),
        }
    }
}
