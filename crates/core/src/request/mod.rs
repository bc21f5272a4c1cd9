//! Option normalization and request building.

mod builder;
mod options;

pub use builder::{
    build_delete, build_get, build_put, build_query, build_scan, build_update, project_page,
    update_expression_for,
};
pub use options::{normalize, KeyArg, Options, ResolvedOptions};

use crate::value::{Arg, Map, Value};

/// Result of a findAll or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub count: i32,
    pub rows: Vec<Map>,
    pub scanned_count: i32,
}

impl From<QueryResult> for Value {
    fn from(result: QueryResult) -> Self {
        let mut map = Map::new();
        map.insert("count", result.count);
        map.insert(
            "rows",
            Value::List(result.rows.into_iter().map(Value::Map).collect()),
        );
        map.insert("scannedCount", result.scanned_count);
        Value::Map(map)
    }
}

impl From<QueryResult> for Arg {
    fn from(result: QueryResult) -> Self {
        Value::from(result).into()
    }
}
