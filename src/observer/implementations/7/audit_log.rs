// Ring 7: Audit Log - one structured line per completed write
use async_trait::async_trait;

use crate::models::Collection;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{AuditObserver, Observer, ObserverRing, Operation};

#[derive(Default)]
pub struct AuditLogObserver;

impl Observer for AuditLogObserver {
    fn name(&self) -> &'static str {
        "AuditLogObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op.is_write()
    }

    fn applies_to_collection(&self, _collection: Collection) -> bool {
        true
    }
}

#[async_trait]
impl AuditObserver for AuditLogObserver {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError> {
        let ids: Vec<String> = ctx.record_ids().iter().map(|id| id.to_string()).collect();
        tracing::info!(
            target: "blog_api_rust::audit",
            operation = %ctx.operation,
            collection = %ctx.collection,
            records = ctx.records.len(),
            elapsed_ms = ctx.execution_time().as_millis() as u64,
            "audit: {} {} [{}]",
            ctx.operation,
            ctx.collection,
            ids.join(", ")
        );
        Ok(())
    }
}
