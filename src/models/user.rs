use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_text, Collection, Entity, ModelError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Number of retirements whose posts were handed to this account.
    #[serde(default)]
    pub reassigned_posts: i64,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: UserRole::User,
            avatar: None,
            bio: String::new(),
            is_active: true,
            reassigned_posts: 0,
            last_login: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// The inactive account that inherits retired users' posts.
    pub fn placeholder(id: Uuid) -> Self {
        let mut user = Self::new("deleted", format!("deleted+{}@placeholder.invalid", id.simple()), "Deleted", "User");
        user.id = id;
        user.is_active = false;
        user
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text("username", &self.username)?;
        require_text("email", &self.email)?;
        require_text("firstName", &self.first_name)?;
        require_text("lastName", &self.last_name)?;
        if !self.email.contains('@') {
            return Err(ModelError::validation("email", "must contain '@'"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_uses_camel_case() {
        let user = User::new("ada", "ada@example.com", "Ada", "Lovelace");
        let doc = user.to_document().unwrap();
        assert_eq!(doc["isActive"], serde_json::json!(true));
        assert_eq!(doc["reassignedPosts"], serde_json::json!(0));
        assert_eq!(doc["firstName"], serde_json::json!("Ada"));
        assert!(!doc.contains_key("createdAt"));
    }

    #[test]
    fn decodes_with_defaults() {
        let id = Uuid::new_v4();
        let doc = serde_json::json!({
            "id": id.to_string(),
            "username": "bob",
            "email": "bob@example.com",
            "firstName": "Bob",
            "lastName": "Builder"
        });
        let user = User::from_document(doc.as_object().cloned().unwrap()).unwrap();
        assert!(user.is_active);
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.full_name(), "Bob Builder");
    }

    #[test]
    fn rejects_blank_username() {
        let user = User::new("  ", "x@example.com", "X", "Y");
        assert!(matches!(user.validate(), Err(ModelError::Validation { field, .. }) if field == "username"));
    }

    #[test]
    fn placeholder_is_inactive() {
        let id = Uuid::new_v4();
        let user = User::placeholder(id);
        assert_eq!(user.id, id);
        assert!(!user.is_active);
        assert!(user.validate().is_ok());
    }
}
