// Ring 1: Reference Integrity - referenced users, posts, categories and parent comments must exist
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::filter::FilterData;
use crate::models::{document_uuid, Collection, Document};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

#[derive(Default)]
pub struct ReferenceIntegrityObserver;

impl Observer for ReferenceIntegrityObserver {
    fn name(&self) -> &'static str {
        "ReferenceIntegrityObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        matches!(collection, Collection::Posts | Collection::Comments)
    }
}

#[async_trait]
impl HookObserver for ReferenceIntegrityObserver {
    async fn execute(&self, ctx: &mut ObserverContext, session: &mut Session<'_>) -> Result<(), ObserverError> {
        // Reference values to check: the whole document on create, only the
        // assigned fields on update
        let mut assigned = Vec::new();
        for (field, target) in reference_targets(ctx.collection) {
            let value = match ctx.operation {
                Operation::Create => ctx.document.as_ref().and_then(|d| d.get(*field)),
                _ => ctx.patch.as_ref().and_then(|p| p.sets(field)),
            };
            if let Some(value) = value {
                assigned.push((*field, *target, value.clone()));
            }
        }

        for (field, target, value) in assigned {
            let Some(id) = parse_reference(field, &value)? else {
                continue;
            };

            if field == "parentComment" {
                let parent_post = ctx.document.as_ref().and_then(|d| document_uuid(d, "post"));
                check_parent(session, id, parent_post).await?;
            } else if !session.exists(target, id).await? {
                return Err(ObserverError::ValidationError(format!(
                    "{} references unknown {} {}",
                    field, target, id
                )));
            }
        }
        Ok(())
    }
}

/// Reference fields per collection and the collection they point into
fn reference_targets(collection: Collection) -> &'static [(&'static str, Collection)] {
    match collection {
        Collection::Posts => &[("author", Collection::Users), ("category", Collection::Categories)],
        Collection::Comments => &[
            ("author", Collection::Users),
            ("post", Collection::Posts),
            ("parentComment", Collection::Comments),
        ],
        _ => &[],
    }
}

fn parse_reference(field: &str, value: &Value) -> Result<Option<Uuid>, ObserverError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| ObserverError::ValidationError(format!("{} is not a valid id: {}", field, s))),
        other => Err(ObserverError::ValidationError(format!("{} must be an id, got {}", field, other))),
    }
}

/// Soft-deleted parents still resolve so threads stay intact.
async fn check_parent(session: &mut Session<'_>, parent_id: Uuid, post: Option<Uuid>) -> Result<(), ObserverError> {
    let ctx = session
        .run(ObserverContext::find_one(Collection::Comments, FilterData::by_id(parent_id)).include_deleted())
        .await?;
    let parent: Document = ctx
        .into_documents()
        .into_iter()
        .next()
        .ok_or_else(|| ObserverError::ValidationError(format!("parentComment references unknown Comment {}", parent_id)))?;

    if let Some(post) = post {
        if document_uuid(&parent, "post") != Some(post) {
            return Err(ObserverError::ValidationError(format!(
                "parent comment {} belongs to a different post",
                parent_id
            )));
        }
    }
    Ok(())
}
