// Ring 6: Category Counter - keeps postCount in step with post creation and re-categorisation
use async_trait::async_trait;
use uuid::Uuid;

use crate::filter::FilterData;
use crate::models::{document_uuid, Collection, Patch};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

#[derive(Default)]
pub struct CategoryCounterObserver;

impl Observer for CategoryCounterObserver {
    fn name(&self) -> &'static str {
        "CategoryCounterObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Posts
    }
}

#[async_trait]
impl HookObserver for CategoryCounterObserver {
    async fn execute(&self, ctx: &mut ObserverContext, session: &mut Session<'_>) -> Result<(), ObserverError> {
        let mut deltas: Vec<(Uuid, i64)> = Vec::new();
        for record in ctx.records.iter().filter(|r| r.changed("category")) {
            if let Some(previous) = record.original().and_then(|o| document_uuid(o, "category")) {
                deltas.push((previous, -1));
            }
            if let Some(current) = document_uuid(record.current(), "category") {
                deltas.push((current, 1));
            }
        }

        for (category, by) in deltas {
            adjust_post_count(session, category, by).await?;
        }
        Ok(())
    }
}

/// Add `by` to a category's postCount. A missing category is left alone.
pub(crate) async fn adjust_post_count(session: &mut Session<'_>, category: Uuid, by: i64) -> Result<(), ObserverError> {
    let updated = session
        .update_many(Collection::Categories, FilterData::by_id(category), Patch::new().inc("postCount", by))
        .await?;
    tracing::debug!("Category {} postCount adjusted by {} ({} rows)", category, by, updated.len());
    Ok(())
}
