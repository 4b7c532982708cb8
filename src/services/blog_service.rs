use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};
use crate::database::{DocumentStore, EntityStore};
use crate::error::BlogError;
use crate::filter::FilterData;
use crate::models::{Category, Collection, Comment, Entity, Patch, Post, PostStatus, User};
use crate::observer::implementations::{CascadeIncomplete, CascadeReport};
use crate::observer::{ObserverContext, ObserverError, ObserverPipeline, QueryMonitor};
use crate::services::retirement::{RetirementReport, RetirementWorkflow};

/// Which references of a post to populate on read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostExpansion {
    pub author: bool,
    pub category: bool,
}

impl PostExpansion {
    pub const NONE: PostExpansion = PostExpansion {
        author: false,
        category: false,
    };
    pub const ALL: PostExpansion = PostExpansion {
        author: true,
        category: true,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
}

/// Outcome of `remove_post`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRemoval {
    pub post: Post,
    /// Cascade steps that did not apply (best-effort mode only)
    pub incomplete: Option<CascadeIncomplete>,
}

impl PostRemoval {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }
}

/// A post with its requested references populated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_details: Option<AuthorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_details: Option<CategorySummary>,
}

/// Entry point for the request layer: entity reads and writes, post
/// removal, comment soft delete and user retirement.
pub struct BlogService {
    entities: EntityStore,
    config: AppConfig,
    placeholder: Uuid,
}

impl BlogService {
    /// Build the standard pipeline over `store` and resolve the placeholder
    /// account.
    pub async fn bootstrap(config: AppConfig, store: Arc<dyn DocumentStore>, monitor: Arc<dyn QueryMonitor>) -> Result<Self, BlogError> {
        let pipeline = ObserverPipeline::standard(&config, monitor)?;
        Self::with_pipeline(config, store, pipeline).await
    }

    /// Like `bootstrap`, with a caller-assembled pipeline.
    pub async fn with_pipeline(config: AppConfig, store: Arc<dyn DocumentStore>, pipeline: ObserverPipeline) -> Result<Self, BlogError> {
        let placeholder = config.placeholder_user_id()?;
        let entities = EntityStore::new(store, Arc::new(pipeline));
        resolve_placeholder(&entities, &config, placeholder).await?;

        tracing::info!(
            "Blog service ready: backend={}, cascade={:?}, placeholder={}",
            entities.backend(),
            config.cascade.mode,
            placeholder
        );
        Ok(Self {
            entities,
            config,
            placeholder,
        })
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn placeholder(&self) -> Uuid {
        self.placeholder
    }

    // Lifecycle operations

    /// Retire `target`, handing their posts to the configured placeholder.
    pub async fn retire_user(&self, target: Uuid) -> Result<RetirementReport, BlogError> {
        self.retire_user_with(target, self.placeholder).await
    }

    pub async fn retire_user_with(&self, target: Uuid, placeholder: Uuid) -> Result<RetirementReport, BlogError> {
        RetirementWorkflow::new(&self.entities, self.config.store.transaction_timeout())
            .retire(target, placeholder)
            .await
    }

    /// Hard-delete a post and cascade to its comments and category.
    ///
    /// In best-effort mode the removal succeeds even when a cascade step
    /// failed; the result then carries the failed steps.
    pub async fn remove_post(&self, id: Uuid) -> Result<PostRemoval, BlogError> {
        let ctx = self
            .entities
            .execute(ObserverContext::delete(Collection::Posts, FilterData::by_id(id)), None)
            .await?;
        let incomplete = ctx
            .get_metadata::<CascadeReport>()
            .and_then(|report| report.incomplete.iter().find(|i| i.post_id == id).cloned());

        let removed = ctx
            .into_documents()
            .into_iter()
            .next()
            .ok_or_else(|| BlogError::not_found(Collection::Posts, id))?;
        Ok(PostRemoval {
            post: Post::from_document(removed)?,
            incomplete,
        })
    }

    /// Mark a comment deleted. Marking it again is a no-op.
    pub async fn soft_delete_comment(&self, id: Uuid) -> Result<(), BlogError> {
        let ctx = ObserverContext::update(
            Collection::Comments,
            FilterData::by_id(id),
            Patch::new().set("isDeleted", true),
        )
        .include_deleted();

        let ctx = self.entities.execute(ctx, None).await?;
        if ctx.records.is_empty() {
            return Err(BlogError::not_found(Collection::Comments, id));
        }
        Ok(())
    }

    // Users

    pub async fn get_user(&self, id: Uuid) -> Result<User, BlogError> {
        Ok(self.entities.get_entity(id, None).await?)
    }

    pub async fn list_users(&self, filter: FilterData) -> Result<Vec<User>, BlogError> {
        Ok(self.entities.query_entities(filter, None).await?)
    }

    pub async fn create_user(&self, user: User) -> Result<User, BlogError> {
        Ok(self.entities.create_entity(&user, None).await?)
    }

    pub async fn update_user(&self, id: Uuid, patch: Patch) -> Result<User, BlogError> {
        Ok(self.entities.update_entity(id, patch, None).await?)
    }

    pub async fn toggle_user_active(&self, id: Uuid) -> Result<User, BlogError> {
        let mut tx = self.entities.begin().await?;
        let user: User = self.entities.get_entity(id, Some(&mut tx)).await?;
        let updated = self
            .entities
            .update_entity(id, Patch::new().set("isActive", !user.is_active), Some(&mut tx))
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<User, BlogError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        Ok(self.entities.update_entity(id, Patch::new().set("lastLogin", now), None).await?)
    }

    // Categories

    pub async fn get_category(&self, id: Uuid) -> Result<Category, BlogError> {
        Ok(self.entities.get_entity(id, None).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, BlogError> {
        let filter = FilterData::default().order(json!({ "name": "asc" }));
        Ok(self.entities.query_entities(filter, None).await?)
    }

    pub async fn create_category(&self, category: Category) -> Result<Category, BlogError> {
        Ok(self.entities.create_entity(&category, None).await?)
    }

    // Posts

    pub async fn get_post(&self, id: Uuid, expand: PostExpansion) -> Result<PostView, BlogError> {
        let post: Post = self.entities.get_entity(id, None).await?;
        let mut views = self.expand(vec![post], expand).await?;
        views.pop().ok_or_else(|| BlogError::not_found(Collection::Posts, id))
    }

    pub async fn list_posts(&self, filter: FilterData, expand: PostExpansion) -> Result<Vec<PostView>, BlogError> {
        let posts: Vec<Post> = self.entities.query_entities(filter, None).await?;
        self.expand(posts, expand).await
    }

    pub async fn posts_by_author(&self, author: Uuid, expand: PostExpansion) -> Result<Vec<PostView>, BlogError> {
        let filter = FilterData::new(json!({ "author": author.to_string() })).order(json!({ "createdAt": "desc" }));
        self.list_posts(filter, expand).await
    }

    pub async fn posts_by_category(&self, category: Uuid, expand: PostExpansion) -> Result<Vec<PostView>, BlogError> {
        let filter = FilterData::new(json!({ "category": category.to_string() })).order(json!({ "createdAt": "desc" }));
        self.list_posts(filter, expand).await
    }

    pub async fn create_post(&self, post: Post) -> Result<Post, BlogError> {
        Ok(self.entities.create_entity(&post, None).await?)
    }

    pub async fn update_post(&self, id: Uuid, patch: Patch) -> Result<Post, BlogError> {
        Ok(self.entities.update_entity(id, patch, None).await?)
    }

    pub async fn publish_post(&self, id: Uuid) -> Result<Post, BlogError> {
        self.update_post(id, Patch::new().set("status", PostStatus::Published.as_str())).await
    }

    pub async fn record_view(&self, id: Uuid) -> Result<Post, BlogError> {
        self.update_post(id, Patch::new().inc("viewCount", 1)).await
    }

    /// Add or remove `user` from the post's likes; returns the new count.
    pub async fn toggle_like(&self, post_id: Uuid, user: Uuid) -> Result<usize, BlogError> {
        let mut tx = self.entities.begin().await?;
        self.entities.get(Collection::Users, user, Some(&mut tx)).await?;
        let post: Post = self.entities.get_entity(post_id, Some(&mut tx)).await?;

        let patch = if post.likes.contains(&user) {
            Patch::new().pull("likes", user.to_string())
        } else {
            Patch::new().add_to_set("likes", user.to_string())
        };
        let updated: Post = self.entities.update_entity(post_id, patch, Some(&mut tx)).await?;
        tx.commit().await?;
        Ok(updated.like_count())
    }

    // Comments

    pub async fn get_comment(&self, id: Uuid) -> Result<Comment, BlogError> {
        Ok(self.entities.get_entity(id, None).await?)
    }

    pub async fn list_comments(&self, filter: FilterData) -> Result<Vec<Comment>, BlogError> {
        Ok(self.entities.query_entities(filter, None).await?)
    }

    /// Visible comments of a post, oldest first
    pub async fn comments_for_post(&self, post: Uuid) -> Result<Vec<Comment>, BlogError> {
        let filter = FilterData::new(json!({ "post": post.to_string() })).order(json!({ "createdAt": "asc" }));
        self.list_comments(filter).await
    }

    pub async fn create_comment(&self, comment: Comment) -> Result<Comment, BlogError> {
        Ok(self.entities.create_entity(&comment, None).await?)
    }

    pub async fn edit_comment(&self, id: Uuid, content: &str) -> Result<Comment, BlogError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BlogError::validation("comment content is required"));
        }
        Ok(self.entities.update_entity(id, Patch::new().set("content", content), None).await?)
    }

    /// Populate the requested references with one query per collection.
    async fn expand(&self, posts: Vec<Post>, expand: PostExpansion) -> Result<Vec<PostView>, BlogError> {
        let authors = if expand.author {
            let ids: BTreeSet<Uuid> = posts.iter().map(|p| p.author).collect();
            self.load_by_ids::<User>(ids)
                .await?
                .into_iter()
                .map(|u| {
                    let summary = AuthorSummary {
                        id: u.id,
                        username: u.username,
                        avatar: u.avatar,
                    };
                    (summary.id, summary)
                })
                .collect()
        } else {
            HashMap::new()
        };

        let categories = if expand.category {
            let ids: BTreeSet<Uuid> = posts.iter().filter_map(|p| p.category).collect();
            self.load_by_ids::<Category>(ids)
                .await?
                .into_iter()
                .map(|c| (c.id, CategorySummary { id: c.id, name: c.name }))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                author_details: authors.get(&post.author).cloned(),
                category_details: post.category.and_then(|c| categories.get(&c).cloned()),
                post,
            })
            .collect())
    }

    async fn load_by_ids<T: Entity>(&self, ids: BTreeSet<Uuid>) -> Result<Vec<T>, BlogError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let filter = FilterData::new(json!({ "id": { "$in": ids } }));
        Ok(self.entities.query_entities(filter, None).await?)
    }
}

/// Make sure the placeholder account exists, creating it when allowed.
async fn resolve_placeholder(entities: &EntityStore, config: &AppConfig, placeholder: Uuid) -> Result<(), BlogError> {
    match entities.get(Collection::Users, placeholder, None).await {
        Ok(_) => Ok(()),
        Err(ObserverError::NotFound { .. }) => {
            if !config.retirement.provision_placeholder {
                return Err(ConfigError::PlaceholderMissing(placeholder).into());
            }
            tracing::info!("Provisioning placeholder user {}", placeholder);
            entities.create_entity(&User::placeholder(placeholder), None).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
