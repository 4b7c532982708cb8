//! Typed entities and their document representation.
//!
//! Every entity is stored as a JSON document with camelCase field names.
//! The store owns `id`-uniqueness and the `createdAt` / `updatedAt`
//! timestamps; everything else is produced by the entity's serde impl.

pub mod category;
pub mod comment;
pub mod patch;
pub mod post;
pub mod user;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use category::Category;
pub use comment::Comment;
pub use patch::Patch;
pub use post::{Post, PostStatus};
pub use user::{User, UserRole};

/// A stored document.
pub type Document = Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Document decode error: {0}")]
    Decode(String),
}

impl ModelError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The four entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Posts,
    Comments,
    Categories,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Posts,
        Collection::Comments,
        Collection::Categories,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::Categories => "categories",
        }
    }

    pub fn entity_name(&self) -> &'static str {
        match self {
            Collection::Users => "User",
            Collection::Posts => "Post",
            Collection::Comments => "Comment",
            Collection::Categories => "Category",
        }
    }

    /// Reference fields that get an index in persistent backends.
    pub fn reference_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &[],
            Collection::Posts => &["author", "category"],
            Collection::Comments => &["author", "post", "parentComment"],
            Collection::Categories => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

/// Typed view over a collection's documents.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;

    /// Construction pre-conditions.
    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }

    fn to_document(&self) -> Result<Document, ModelError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ModelError::Decode(format!("{} did not serialize to an object", Self::COLLECTION))),
            Err(e) => Err(ModelError::Decode(e.to_string())),
        }
    }

    fn from_document(doc: Document) -> Result<Self, ModelError> {
        serde_json::from_value(Value::Object(doc)).map_err(|e| ModelError::Decode(format!("{}: {}", Self::COLLECTION, e)))
    }
}

/// Read a UUID-valued field from a document.
pub fn document_uuid(doc: &Document, field: &str) -> Option<Uuid> {
    doc.get(field).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::validation(field, "is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_uuid_fields() {
        let id = Uuid::new_v4();
        let doc = json!({ "author": id.to_string(), "post": "not-a-uuid" }).as_object().cloned().unwrap();
        assert_eq!(document_uuid(&doc, "author"), Some(id));
        assert_eq!(document_uuid(&doc, "post"), None);
        assert_eq!(document_uuid(&doc, "missing"), None);
    }

    #[test]
    fn collection_names() {
        assert_eq!(Collection::Comments.table_name(), "comments");
        assert_eq!(Collection::Categories.to_string(), "Category");
    }
}
