pub mod commands;
pub mod utils;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, StoreBackend};
use crate::database::{DocumentStore, MemoryStore, PgStore};
use crate::observer::TracingMonitor;
use crate::services::BlogService;

#[derive(Parser)]
#[command(name = "blog")]
#[command(about = "Blog CLI - maintenance operations on the blog entity store")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Schema migration and connectivity")]
    Store {
        #[command(subcommand)]
        cmd: commands::store::StoreCommands,
    },

    #[command(about = "User lookup, placeholder provisioning and retirement")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Post reads and removal")]
    Post {
        #[command(subcommand)]
        cmd: commands::post::PostCommands,
    },

    #[command(about = "Comment reads and soft delete")]
    Comment {
        #[command(subcommand)]
        cmd: commands::comment::CommentCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Store { cmd } => commands::store::handle(cmd, &config, output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, config, output_format).await,
        Commands::Post { cmd } => commands::post::handle(cmd, config, output_format).await,
        Commands::Comment { cmd } => commands::comment::handle(cmd, config, output_format).await,
    }
}

/// Open the configured backend
pub async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let timeout = config.store.transaction_timeout();
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; nothing outlives this process");
            Ok(Arc::new(MemoryStore::new(timeout)))
        }
        StoreBackend::Postgres => Ok(Arc::new(PgStore::connect(&config.database, timeout).await?)),
    }
}

/// Open the store and bootstrap the blog service on it
pub async fn open_service(config: AppConfig) -> anyhow::Result<BlogService> {
    let store = open_store(&config).await?;
    let monitor = Arc::new(TracingMonitor::new(config.slow_query_threshold()));
    Ok(BlogService::bootstrap(config, store, monitor).await?)
}
