// Ring 2: Soft Delete Filter - hides comments marked isDeleted from every read and update
use async_trait::async_trait;
use serde_json::json;

use crate::models::Collection;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

/// Narrows the caller's filter with `isDeleted != true`. The caller's own
/// clause is kept and combined through `$and`, never replaced.
#[derive(Default)]
pub struct SoftDeleteFilterObserver;

impl Observer for SoftDeleteFilterObserver {
    fn name(&self) -> &'static str {
        "SoftDeleteFilterObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Security
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Find | Operation::FindOne | Operation::Update)
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Comments
    }
}

#[async_trait]
impl HookObserver for SoftDeleteFilterObserver {
    async fn execute(&self, ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        if ctx.options.include_deleted {
            tracing::trace!("Soft delete filter bypassed for internal {}", ctx.operation);
            return Ok(());
        }
        ctx.filter_data.and(json!({ "isDeleted": { "$ne": true } }));
        Ok(())
    }
}
