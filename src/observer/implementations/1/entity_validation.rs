// Ring 1: Entity Validation - construction pre-conditions on create, protected fields on update
use async_trait::async_trait;

use crate::models::{Category, Collection, Comment, Document, Entity, ModelError, Post, User};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

/// Decodes created documents into their entity type and checks them.
#[derive(Default)]
pub struct EntityValidationObserver;

impl Observer for EntityValidationObserver {
    fn name(&self) -> &'static str {
        "EntityValidationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, _collection: Collection) -> bool {
        true
    }
}

#[async_trait]
impl HookObserver for EntityValidationObserver {
    async fn execute(&self, ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        match ctx.operation {
            Operation::Create => {
                let doc = ctx
                    .document
                    .as_ref()
                    .ok_or_else(|| ObserverError::ValidationError("create requires a document".to_string()))?;
                validate_document(ctx.collection, doc)?;
            }
            Operation::Update => {
                if let Some(patch) = &ctx.patch {
                    patch.validate()?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn validate_document(collection: Collection, doc: &Document) -> Result<(), ModelError> {
    match collection {
        Collection::Users => User::from_document(doc.clone())?.validate(),
        Collection::Posts => Post::from_document(doc.clone())?.validate(),
        Collection::Comments => Comment::from_document(doc.clone())?.validate(),
        Collection::Categories => Category::from_document(doc.clone())?.validate(),
    }
}
