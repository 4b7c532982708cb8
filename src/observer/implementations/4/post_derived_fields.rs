// Ring 4: Post Derived Fields - excerpt from content, publishedAt on published creates
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::models::{Collection, PostStatus};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

pub const EXCERPT_LEN: usize = 100;

#[derive(Default)]
pub struct PostDerivedFieldsObserver;

impl Observer for PostDerivedFieldsObserver {
    fn name(&self) -> &'static str {
        "PostDerivedFieldsObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Posts
    }
}

#[async_trait]
impl HookObserver for PostDerivedFieldsObserver {
    async fn execute(&self, ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        let published = json!(PostStatus::Published.as_str());

        if ctx.operation == Operation::Create {
            if let Some(doc) = ctx.document.as_mut() {
                if let Some(content) = doc.get("content").and_then(Value::as_str) {
                    let excerpt = excerpt(content);
                    doc.insert("excerpt".to_string(), Value::String(excerpt));
                }
                if doc.get("status") == Some(&published) {
                    doc.insert("publishedAt".to_string(), Value::String(now()));
                }
            }
            return Ok(());
        }

        // Updates get publishedAt per record in ring 6
        if let Some(patch) = ctx.patch.as_mut() {
            if let Some(content) = patch.sets("content").and_then(Value::as_str) {
                let excerpt = excerpt(content);
                patch.insert_set("excerpt", excerpt);
            }
        }
        Ok(())
    }
}

fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_LEN).collect()
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters() {
        let content = "é".repeat(150);
        assert_eq!(excerpt(&content).chars().count(), EXCERPT_LEN);
        assert_eq!(excerpt("short"), "short");
    }
}
