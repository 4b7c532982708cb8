use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, StoreBackend};
use crate::database::{schema, PgStore};

#[derive(Subcommand)]
pub enum StoreCommands {
    #[command(about = "Create collection tables and reference indexes")]
    Migrate,

    #[command(about = "Check that the configured store is reachable")]
    Health,
}

pub async fn handle(cmd: StoreCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.store.backend != StoreBackend::Postgres {
        return output_success(output_format, "In-memory store needs no migration or health check", None);
    }
    config.validate_database_url()?;
    let store = PgStore::connect(&config.database, config.store.transaction_timeout()).await?;

    match cmd {
        StoreCommands::Migrate => {
            schema::migrate(store.pool()).await?;
            output_success(
                output_format,
                "Schema migrated",
                Some(json!({ "statements": schema::ddl_statements().len() })),
            )
        }
        StoreCommands::Health => {
            store.health_check().await?;
            output_success(output_format, "Store is reachable", Some(json!({ "backend": "postgres" })))
        }
    }
}
