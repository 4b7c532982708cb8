// Ring 6: Publish Stamp - dates each post at the moment its own status turns published
use async_trait::async_trait;
use serde_json::json;

use crate::models::{Collection, Patch, PostStatus};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

use super::post_derived_fields::now;

/// Sets `publishedAt` on the updated posts whose status moved to
/// published. Posts that were already published keep their timestamp,
/// however many rows the update matched.
#[derive(Default)]
pub struct PublishStampObserver;

impl Observer for PublishStampObserver {
    fn name(&self) -> &'static str {
        "PublishStampObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Update
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Posts
    }
}

#[async_trait]
impl HookObserver for PublishStampObserver {
    async fn execute(&self, ctx: &mut ObserverContext, session: &mut Session<'_>) -> Result<(), ObserverError> {
        if ctx.patch.as_ref().map_or(false, |p| p.sets("publishedAt").is_some()) {
            return Ok(());
        }

        let published = json!(PostStatus::Published.as_str());
        for record in ctx.records.iter_mut() {
            if !record.changed("status") || record.get("status") != Some(&published) {
                continue;
            }
            let Some(id) = record.id() else { continue };

            let stamped = session.update(Collection::Posts, id, Patch::new().set("publishedAt", now())).await?;
            *record.current_mut() = stamped;
        }
        Ok(())
    }
}
