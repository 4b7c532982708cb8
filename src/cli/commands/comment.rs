use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::{output_items, output_success};
use crate::cli::{open_service, OutputFormat};
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum CommentCommands {
    #[command(about = "List the visible comments of a post, oldest first")]
    List {
        #[arg(help = "Post id")]
        post: Uuid,
    },

    #[command(about = "Hide a comment from every read without erasing it")]
    SoftDelete {
        #[arg(help = "Comment id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: CommentCommands, config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = open_service(config).await?;

    match cmd {
        CommentCommands::List { post } => {
            let comments = service.comments_for_post(post).await?;
            output_items(output_format, "comments", &comments, |c| {
                let edited = if c.is_edited { " (edited)" } else { "" };
                format!("{}  {}: {}{}", c.id, c.author, c.content, edited)
            })
        }
        CommentCommands::SoftDelete { id } => {
            service.soft_delete_comment(id).await?;
            output_success(
                output_format,
                &format!("Comment {} deleted", id),
                Some(json!({ "id": id, "isDeleted": true })),
            )
        }
    }
}
