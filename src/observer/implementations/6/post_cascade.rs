// Ring 6: Post Cascade - removes a deleted post's comments and releases its category slot
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::config::CascadeMode;
use crate::filter::FilterData;
use crate::models::{document_uuid, Collection};
use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::session::Session;
use crate::observer::traits::{HookObserver, Observer, ObserverRing, Operation};

use super::category_counter::adjust_post_count;

const STEP_SAVEPOINT: &str = "post_cascade_step";

/// Steps that follow a post deletion, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStep {
    DeleteComments,
    DecrementCategory,
}

/// A removed post whose cascade did not fully apply
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("Cascade incomplete for post {post_id}: {failed_steps:?}")]
pub struct CascadeIncomplete {
    pub post_id: Uuid,
    pub failed_steps: Vec<CascadeStep>,
}

/// Context metadata left by a best-effort cascade with failed steps
#[derive(Debug, Clone, Default)]
pub struct CascadeReport {
    pub incomplete: Vec<CascadeIncomplete>,
}

/// Deletes every comment of a removed post and decrements its category.
///
/// Atomic: a failing step fails the deletion, rolling it back with the
/// transaction. Best effort: each step runs under its own savepoint; a
/// failed step is undone, logged and recorded as a warning plus a
/// [`CascadeReport`], and the deletion stands.
pub struct PostCascadeObserver {
    mode: CascadeMode,
}

impl PostCascadeObserver {
    pub fn new(mode: CascadeMode) -> Self {
        Self { mode }
    }
}

impl Default for PostCascadeObserver {
    fn default() -> Self {
        Self::new(CascadeMode::Atomic)
    }
}

impl Observer for PostCascadeObserver {
    fn name(&self) -> &'static str {
        "PostCascadeObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Delete
    }

    fn applies_to_collection(&self, collection: Collection) -> bool {
        collection == Collection::Posts
    }
}

#[async_trait]
impl HookObserver for PostCascadeObserver {
    async fn execute(&self, ctx: &mut ObserverContext, session: &mut Session<'_>) -> Result<(), ObserverError> {
        let removed: Vec<(Uuid, Option<Uuid>)> = ctx
            .records
            .iter()
            .filter_map(|r| Some((r.id()?, document_uuid(r.current(), "category"))))
            .collect();

        let mut report = CascadeReport::default();
        for (post_id, category) in removed {
            let mut steps = vec![CascadeStep::DeleteComments];
            if category.is_some() {
                steps.push(CascadeStep::DecrementCategory);
            }

            if self.mode == CascadeMode::Atomic {
                for step in steps {
                    run_step(session, step, post_id, category).await?;
                }
                continue;
            }

            let mut failed_steps = Vec::new();
            for step in steps {
                if let Err(e) = attempt(session, step, post_id, category).await {
                    tracing::warn!("Data integrity: cascade step {:?} for post {} failed: {}", step, post_id, e);
                    failed_steps.push(step);
                }
            }
            if !failed_steps.is_empty() {
                let incomplete = CascadeIncomplete { post_id, failed_steps };
                tracing::warn!("Data integrity: {}", incomplete);
                ctx.add_warning(ObserverWarning::new(self.name(), self.ring(), incomplete.to_string()));
                report.incomplete.push(incomplete);
            }
        }

        if !report.incomplete.is_empty() {
            ctx.set_metadata(report);
        }
        Ok(())
    }
}

/// Run one step under a savepoint, undoing its partial work on failure.
async fn attempt(
    session: &mut Session<'_>,
    step: CascadeStep,
    post_id: Uuid,
    category: Option<Uuid>,
) -> Result<(), ObserverError> {
    session.savepoint(STEP_SAVEPOINT).await?;
    match run_step(session, step, post_id, category).await {
        Ok(()) => session.release_savepoint(STEP_SAVEPOINT).await,
        Err(e) => {
            if let Err(undo) = session.rollback_to_savepoint(STEP_SAVEPOINT).await {
                tracing::error!("Could not undo cascade step {:?} for post {}: {}", step, post_id, undo);
            }
            Err(e)
        }
    }
}

async fn run_step(
    session: &mut Session<'_>,
    step: CascadeStep,
    post_id: Uuid,
    category: Option<Uuid>,
) -> Result<(), ObserverError> {
    match step {
        CascadeStep::DeleteComments => {
            let comments = session.delete_many(Collection::Comments, comments_of_post(post_id)).await?;
            tracing::info!("Cascade removed {} comments of post {}", comments.len(), post_id);
        }
        CascadeStep::DecrementCategory => {
            if let Some(category) = category {
                adjust_post_count(session, category, -1).await?;
            }
        }
    }
    Ok(())
}

/// Every comment of a post, soft-deleted ones included. Deletes never pass
/// through the soft delete filter.
pub fn comments_of_post(post_id: Uuid) -> FilterData {
    FilterData::new(json!({ "post": post_id.to_string() }))
}
