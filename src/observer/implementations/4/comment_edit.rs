// Ring 4: Comment Edit - flags comments whose content was changed
use async_trait::async_trait;

use crate::models::Collection;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

#[derive(Default)]
pub struct CommentEditObserver;

impl Observer for CommentEditObserver {
    fn name(&self) -> &'static str {
        "CommentEditObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Update
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Comments
    }
}

#[async_trait]
impl HookObserver for CommentEditObserver {
    async fn execute(&self, ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        if let Some(patch) = ctx.patch.as_mut() {
            if patch.touches("content") {
                patch.insert_set("isEdited", true);
            }
        }
        Ok(())
    }
}
