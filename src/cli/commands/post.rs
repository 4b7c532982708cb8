use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::{output_items, output_success};
use crate::cli::{open_service, OutputFormat};
use crate::config::AppConfig;
use crate::filter::FilterData;
use crate::services::{PostExpansion, PostView};

#[derive(Subcommand)]
pub enum PostCommands {
    #[command(about = "Show a post with its author and category")]
    Show {
        #[arg(help = "Post id")]
        id: Uuid,
    },

    #[command(about = "List posts")]
    List {
        #[arg(long, help = "Only posts by this author")]
        author: Option<Uuid>,

        #[arg(long, help = "Populate author and category")]
        expand: bool,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    #[command(about = "Delete a post together with its comments")]
    Remove {
        #[arg(help = "Post id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: PostCommands, config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = open_service(config).await?;

    match cmd {
        PostCommands::Show { id } => {
            let view = service.get_post(id, PostExpansion::ALL).await?;
            output_items(output_format, "posts", std::slice::from_ref(&view), describe)
        }
        PostCommands::List { author, expand, limit } => {
            let expansion = if expand { PostExpansion::ALL } else { PostExpansion::NONE };
            let views = match author {
                Some(author) => service.posts_by_author(author, expansion).await?,
                None => {
                    let filter = FilterData::default().order(json!({ "createdAt": "desc" })).limit(limit);
                    service.list_posts(filter, expansion).await?
                }
            };
            output_items(output_format, "posts", &views, describe)
        }
        PostCommands::Remove { id } => {
            let removal = service.remove_post(id).await?;
            let message = match &removal.incomplete {
                None => format!("Removed post '{}'", removal.post.title),
                Some(incomplete) => format!("Removed post '{}' ({})", removal.post.title, incomplete),
            };
            output_success(
                output_format,
                &message,
                Some(json!({ "id": removal.post.id, "incomplete": removal.incomplete })),
            )
        }
    }
}

fn describe(view: &PostView) -> String {
    let author = view
        .author_details
        .as_ref()
        .map(|a| a.username.clone())
        .unwrap_or_else(|| view.post.author.to_string());
    let category = view.category_details.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
    format!(
        "{}  [{}] {} by {} in {} ({} views, {} likes)",
        view.post.id,
        view.post.status.as_str(),
        view.post.title,
        author,
        category,
        view.post.view_count,
        view.post.like_count()
    )
}
