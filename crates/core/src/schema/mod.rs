//! Table manifests and reconciliation planning.

mod planning;
mod types;

pub use planning::{
    calculate_sync_plan, compare_table, create_table_request, filter_listed_names,
    format_sync_plan, remote_attributes, remote_key, SyncStep, LISTING_SENTINEL,
};
pub use types::{
    parse_manifest, BillingMode, KeyRole, LocalTable, ProvisionedThroughput, ScalarType,
    TableDefinition,
};
