use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_text, Collection, Entity, ModelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Maintained by side effect on post creation, re-categorisation and
    /// removal; never recomputed on read.
    #[serde(default)]
    pub post_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_color() -> String {
    "#000000".to_string()
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        let slug = slugify(&name);
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            color: default_color(),
            post_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

impl Entity for Category {
    const COLLECTION: Collection = Collection::Categories;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text("name", &self.name)?;
        require_text("slug", &self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_name() {
        assert_eq!(Category::new("  Systems & Rust  ").slug, "systems-rust");
        assert_eq!(Category::new("Web").slug, "web");
    }

    #[test]
    fn default_color_and_count() {
        let c = Category::new("Tech");
        assert_eq!(c.color, "#000000");
        assert_eq!(c.post_count, 0);
    }
}
