use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_text, Collection, Entity, ModelError};

pub const CONTENT_MAX_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author: Uuid,
    pub post: Uuid,
    #[serde(default)]
    pub parent_comment: Option<Uuid>,
    #[serde(default)]
    pub likes: Vec<Uuid>,
    #[serde(default)]
    pub is_edited: bool,
    /// Soft-delete marker. Marked comments stay stored so replies keep a
    /// resolvable parent, but ordinary reads never return them.
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(author: Uuid, post: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into().trim().to_string(),
            author,
            post,
            parent_comment: None,
            likes: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn reply_to(mut self, parent: Uuid) -> Self {
        self.parent_comment = Some(parent);
        self
    }
}

impl Entity for Comment {
    const COLLECTION: Collection = Collection::Comments;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text("content", &self.content)?;
        if self.content.chars().count() > CONTENT_MAX_LEN {
            return Err(ModelError::validation("content", format!("must be at most {} characters", CONTENT_MAX_LEN)));
        }
        if self.parent_comment == Some(self.id) {
            return Err(ModelError::validation("parentComment", "cannot reply to itself"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_comment_is_visible() {
        let c = Comment::new(Uuid::new_v4(), Uuid::new_v4(), " hi ");
        assert!(!c.is_deleted);
        assert_eq!(c.content, "hi");
        let doc = c.to_document().unwrap();
        assert_eq!(doc["isDeleted"], serde_json::json!(false));
        assert_eq!(doc["parentComment"], serde_json::Value::Null);
    }

    #[test]
    fn rejects_empty_content() {
        let c = Comment::new(Uuid::new_v4(), Uuid::new_v4(), "   ");
        assert!(c.validate().is_err());
    }
}
