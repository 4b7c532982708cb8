use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::output_success;
use crate::cli::{open_service, OutputFormat};
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Show a user")]
    Show {
        #[arg(help = "User id")]
        id: Uuid,
    },

    #[command(about = "Create the placeholder account if it does not exist")]
    ProvisionPlaceholder,

    #[command(about = "Retire a user: reassign posts, delete comments, delete the user")]
    Retire {
        #[arg(help = "User id")]
        id: Uuid,

        #[arg(long, help = "Placeholder user id (defaults to BLOG_PLACEHOLDER_USER_ID)")]
        placeholder: Option<Uuid>,
    },
}

pub async fn handle(cmd: UserCommands, mut config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Show { id } => {
            let service = open_service(config).await?;
            let user = service.get_user(id).await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
                OutputFormat::Text => {
                    println!("{} <{}> {}", user.username, user.email, user.full_name());
                    println!("Active: {}, reassigned posts: {}", user.is_active, user.reassigned_posts);
                }
            }
            Ok(())
        }
        UserCommands::ProvisionPlaceholder => {
            config.retirement.provision_placeholder = true;
            let service = open_service(config).await?;
            output_success(
                output_format,
                &format!("Placeholder user {} is in place", service.placeholder()),
                Some(json!({ "placeholder": service.placeholder() })),
            )
        }
        UserCommands::Retire { id, placeholder } => {
            let service = open_service(config).await?;
            let placeholder = placeholder.unwrap_or(service.placeholder());
            let report = service.retire_user_with(id, placeholder).await?;
            output_success(
                output_format,
                &format!(
                    "Retired user {}: {} posts reassigned, {} comments deleted",
                    id, report.posts_reassigned, report.comments_deleted
                ),
                Some(json!({ "report": report })),
            )
        }
    }
}
