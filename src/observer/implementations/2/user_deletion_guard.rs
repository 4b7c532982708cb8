// Ring 2: User Deletion Guard - users are only removed by the retirement workflow
use async_trait::async_trait;
use uuid::Uuid;

use crate::filter::FilterData;
use crate::models::Collection;
use crate::observer::context::{ObserverContext, RetirementScope};
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

/// Rejects user deletions that do not carry a [`RetirementScope`], scoped
/// deletions that reach past their target, and any deletion of the
/// placeholder account.
pub struct UserDeletionGuard {
    placeholder: Option<Uuid>,
}

impl UserDeletionGuard {
    pub fn new(placeholder: Option<Uuid>) -> Self {
        Self { placeholder }
    }
}

impl Observer for UserDeletionGuard {
    fn name(&self) -> &'static str {
        "UserDeletionGuard"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Security
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Delete
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Users
    }
}

#[async_trait]
impl HookObserver for UserDeletionGuard {
    async fn execute(&self, ctx: &mut ObserverContext, _session: &mut Session<'_>) -> Result<(), ObserverError> {
        let scope = ctx.get_metadata::<RetirementScope>().copied().ok_or_else(|| {
            ObserverError::SecurityError("users can only be removed through retirement".to_string())
        })?;

        if scope.target == scope.placeholder || Some(scope.target) == self.placeholder {
            return Err(ObserverError::SecurityError("the placeholder user cannot be deleted".to_string()));
        }
        if ctx.filter_data != FilterData::by_id(scope.target) {
            return Err(ObserverError::SecurityError(format!(
                "retirement of {} may only delete that user",
                scope.target
            )));
        }
        Ok(())
    }
}
