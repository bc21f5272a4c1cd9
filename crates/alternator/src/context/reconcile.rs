//! Startup reconciliation of the manifest against the store (Imperative Shell).

use std::sync::Arc;

use futures_util::future::{try_join_all, FutureExt};

use alternator_core::schema::{
    calculate_sync_plan, compare_table, create_table_request, filter_listed_names, LocalTable,
    SyncStep, TableDefinition,
};
use alternator_core::store::Store;
use alternator_core::Result;

use super::registry::Registration;
use super::Context;

/// Lists, describes, verifies and creates tables until the manifest holds.
///
/// Each manifest entry is registered as soon as the remote tables are known,
/// and its registration completes on its own: a table whose step succeeded
/// stays usable even when a sibling fails. The returned result is the
/// conjunction of every step.
pub(crate) async fn reconcile(context: Arc<Context>, manifest: Vec<TableDefinition>) -> Result<()> {
    tracing::info!(tables = manifest.len(), "Reconciling table manifest");

    for definition in &manifest {
        definition.validate()?;
    }

    let names = filter_listed_names(context.store.list_tables().await?);
    tracing::debug!(remote_tables = names.len(), "Listed remote tables");

    let remote = try_join_all(names.iter().map(|name| context.store.describe_table(name))).await?;

    let steps: Vec<Registration> = calculate_sync_plan(&remote, &manifest)
        .into_iter()
        .map(|step| {
            let name = step.definition().name.clone();
            let registration = run_step(context.store.clone(), step).boxed().shared();
            context.registry.register(&name, registration.clone());

            // Store calls run to completion even if the aggregate fails first.
            tokio::spawn(registration.clone().map(|_| ()));
            registration
        })
        .collect();

    try_join_all(steps).await?;

    tracing::info!("Table manifest reconciled");
    Ok(())
}

async fn run_step(store: Arc<dyn Store>, step: SyncStep) -> Result<Arc<LocalTable>> {
    match &step {
        SyncStep::Verify { definition, remote } => {
            if let Err(error) = compare_table(remote, definition) {
                tracing::error!(table = %definition.name, %error, "Remote table does not match manifest");
                return Err(error);
            }
            tracing::debug!(table = %definition.name, "Remote table matches manifest");
        }
        SyncStep::Create { definition } => {
            let request = create_table_request(definition);
            store.create_table(&request).await?;
            tracing::info!(
                table = %definition.name,
                billing_mode = ?request.billing_mode,
                "Created table"
            );
        }
    }

    Ok(Arc::new(LocalTable::from(step.definition())))
}
