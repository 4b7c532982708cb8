use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_text, Collection, Entity, ModelError};

pub const TITLE_MAX_LEN: usize = 200;
pub const CONTENT_MIN_LEN: usize = 10;
pub const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub author: Uuid,
    #[serde(default)]
    pub category: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub likes: Vec<Uuid>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(author: Uuid, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into().trim().to_string(),
            content: content.into(),
            excerpt: None,
            author,
            category: None,
            tags: Vec::new(),
            status: PostStatus::Draft,
            view_count: 0,
            likes: Vec::new(),
            published_at: None,
            featured: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn in_category(mut self, category: Uuid) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

impl Entity for Post {
    const COLLECTION: Collection = Collection::Posts;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text("title", &self.title)?;
        if self.title.chars().count() > TITLE_MAX_LEN {
            return Err(ModelError::validation("title", format!("must be at most {} characters", TITLE_MAX_LEN)));
        }
        if self.content.chars().count() < CONTENT_MIN_LEN {
            return Err(ModelError::validation("content", format!("must be at least {} characters", CONTENT_MIN_LEN)));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(ModelError::validation("tags", format!("at most {} tags allowed", MAX_TAGS)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_post_is_draft_without_category() {
        let post = Post::new(Uuid::new_v4(), "Hello", "A body long enough");
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.category.is_none());
        assert!(post.validate().is_ok());
    }

    #[test]
    fn rejects_short_content_and_many_tags() {
        let author = Uuid::new_v4();
        assert!(Post::new(author, "T", "short").validate().is_err());
        let tagged = Post::new(author, "T", "long enough body").with_tags((0..11).map(|i| format!("t{}", i)));
        assert!(matches!(tagged.validate(), Err(ModelError::Validation { field, .. }) if field == "tags"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let post = Post::new(Uuid::new_v4(), "T", "long enough body").with_status(PostStatus::Published);
        let doc = post.to_document().unwrap();
        assert_eq!(doc["status"], serde_json::json!("published"));
        assert_eq!(doc["viewCount"], serde_json::json!(0));
        assert_eq!(doc["category"], serde_json::Value::Null);
    }
}
