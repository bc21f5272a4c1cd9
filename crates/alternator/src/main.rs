use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures_util::future::try_join_all;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alternator::schema::{calculate_sync_plan, filter_listed_names, format_sync_plan};
use alternator::{parse_manifest, Database, DynamoDbStore, Store, StoreConfig};

/// alternator - Declarative tables over DynamoDB
#[derive(Parser, Debug)]
#[command(name = "alternator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Custom endpoint URL, e.g. http://localhost:8000 (overrides AWS_ENDPOINT_URL)
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Create missing tables from a manifest and verify existing ones.
    #[command(long_about = "Create missing tables from a manifest and verify existing ones.

The manifest is a JSON array of table definitions:

  [{\"name\": \"users\", \"key\": {\"id\": \"hash\"}, \"attributes\": {\"id\": \"string\"}}]

Existing tables are never altered. A table whose key or attribute types differ
from the manifest is reported and the command fails.

Environment variables:
  AWS_ENDPOINT_URL    - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION          - AWS region (defaults to us-east-1)
  AWS_PROFILE         - AWS profile to use for credentials")]
    Sync {
        /// Path to the manifest file.
        #[arg(long, env = "ALTERNATOR_MANIFEST")]
        manifest: PathBuf,

        /// Only print the plan.
        #[arg(long)]
        dry_run: bool,
    },

    /// List remote tables.
    ListTables,

    /// Delete a table. ALL DATA WILL BE LOST.
    DeleteTable {
        /// Table name.
        name: String,

        /// Required to actually delete.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alternator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StoreConfig::from_env().with_endpoint_url(cli.endpoint_url);
    println!("Target: {}", config.target_display());

    let store = Arc::new(DynamoDbStore::from_config(&config).await);

    match cli.command {
        Command::Sync { manifest, dry_run } => sync(store, &manifest, dry_run).await,
        Command::ListTables => {
            let database = Database::connect(store, Vec::new());
            for name in database.list_tables().await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::DeleteTable { name, force } => {
            if !force {
                bail!("Refusing to delete table '{name}' without --force");
            }
            let database = Database::connect(store, Vec::new());
            database.delete_table(&name).await?;
            println!("Table '{name}' deleted.");
            Ok(())
        }
    }
}

async fn sync(store: Arc<DynamoDbStore>, path: &Path, dry_run: bool) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let manifest = parse_manifest(&json)?;

    let names = filter_listed_names(store.list_tables().await?);
    let remote = try_join_all(names.iter().map(|name| store.describe_table(name))).await?;

    println!("Plan:");
    for line in format_sync_plan(&calculate_sync_plan(&remote, &manifest)) {
        println!("  {line}");
    }

    if dry_run {
        return Ok(());
    }

    let database = Database::connect(store, manifest);
    database.ready().await?;

    println!("Tables are up to date: {}", database.registered_tables().join(", "));
    Ok(())
}
