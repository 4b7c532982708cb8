use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::time::timeout;
use uuid::Uuid;

use crate::database::{EntityStore, Transaction};
use crate::error::BlogError;
use crate::filter::FilterData;
use crate::models::{Collection, Patch};
use crate::observer::{ObserverContext, ObserverError, RetirementScope};

/// Lifecycle of one retirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementState {
    Started,
    StepsApplied,
    Committed,
    Aborted,
}

/// Steps of a retirement, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementStep {
    LookupTarget,
    ReassignPosts,
    DeleteComments,
    CountRetirement,
    DeleteTarget,
}

impl fmt::Display for RetirementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetirementStep::LookupTarget => "lookup target",
            RetirementStep::ReassignPosts => "reassign posts",
            RetirementStep::DeleteComments => "delete comments",
            RetirementStep::CountRetirement => "count retirement",
            RetirementStep::DeleteTarget => "delete target",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementReport {
    pub target: Uuid,
    pub placeholder: Uuid,
    pub posts_reassigned: usize,
    pub comments_deleted: usize,
}

#[derive(Debug)]
struct StepFailure {
    step: RetirementStep,
    error: ObserverError,
}

trait AtStep<T> {
    fn at(self, step: RetirementStep) -> Result<T, StepFailure>;
}

impl<T> AtStep<T> for Result<T, ObserverError> {
    fn at(self, step: RetirementStep) -> Result<T, StepFailure> {
        self.map_err(|error| StepFailure { step, error })
    }
}

/// Retires a user: their posts go to the placeholder account, their
/// comments and the user record are deleted, and the placeholder's
/// `reassignedPosts` counter goes up by one. All of it happens in a single
/// transaction or not at all.
pub struct RetirementWorkflow<'a> {
    entities: &'a EntityStore,
    timeout: Duration,
    state: RetirementState,
}

impl<'a> RetirementWorkflow<'a> {
    pub fn new(entities: &'a EntityStore, timeout: Duration) -> Self {
        Self {
            entities,
            timeout,
            state: RetirementState::Started,
        }
    }

    pub fn state(&self) -> RetirementState {
        self.state
    }

    fn transition(&mut self, target: Uuid, to: RetirementState) {
        tracing::info!("Retirement of {}: {:?} -> {:?}", target, self.state, to);
        self.state = to;
    }

    pub async fn retire(mut self, target: Uuid, placeholder: Uuid) -> Result<RetirementReport, BlogError> {
        if target == placeholder {
            return Err(BlogError::validation("the placeholder user cannot be retired"));
        }
        tracing::info!("Retirement of {} started, placeholder {}", target, placeholder);

        let mut tx = match self.entities.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("Retirement of {} could not open a transaction: {}", target, e);
                self.transition(target, RetirementState::Aborted);
                return Err(BlogError::TransactionFailed);
            }
        };

        let outcome = timeout(self.timeout, apply_steps(self.entities, &mut tx, target, placeholder)).await;
        let failure = match outcome {
            Ok(Ok(report)) => {
                self.transition(target, RetirementState::StepsApplied);
                match tx.commit().await {
                    Ok(()) => {
                        self.transition(target, RetirementState::Committed);
                        return Ok(report);
                    }
                    Err(e) => {
                        tracing::error!("Retirement of {} failed to commit: {}", target, e);
                        self.transition(target, RetirementState::Aborted);
                        return Err(BlogError::TransactionFailed);
                    }
                }
            }
            Ok(Err(failure)) => Some(failure),
            Err(_elapsed) => {
                tracing::error!("Retirement of {} timed out after {:?}", target, self.timeout);
                None
            }
        };

        if let Err(e) = tx.rollback().await {
            tracing::error!("Rollback of retirement {} failed: {}", target, e);
        }
        self.transition(target, RetirementState::Aborted);

        match failure {
            Some(StepFailure {
                step: RetirementStep::LookupTarget,
                error: ObserverError::NotFound { collection, id },
            }) => Err(BlogError::not_found(collection, id)),
            Some(StepFailure { step, error }) => {
                tracing::error!("Retirement of {} failed at step '{}': {}", target, step, error);
                Err(BlogError::TransactionFailed)
            }
            None => Err(BlogError::TransactionFailed),
        }
    }
}

async fn apply_steps(
    entities: &EntityStore,
    tx: &mut Transaction,
    target: Uuid,
    placeholder: Uuid,
) -> Result<RetirementReport, StepFailure> {
    entities
        .get(Collection::Users, target, Some(&mut *tx))
        .await
        .at(RetirementStep::LookupTarget)?;

    let reassigned = entities
        .update_many(
            Collection::Posts,
            FilterData::new(json!({ "author": target.to_string() })),
            Patch::new().set("author", placeholder.to_string()),
            Some(&mut *tx),
        )
        .await
        .at(RetirementStep::ReassignPosts)?;

    let deleted = entities
        .delete_many(
            Collection::Comments,
            FilterData::new(json!({ "author": target.to_string() })),
            Some(&mut *tx),
        )
        .await
        .at(RetirementStep::DeleteComments)?;

    // One per retirement, however many posts moved
    let counted = entities
        .update_many(
            Collection::Users,
            FilterData::by_id(placeholder),
            Patch::new().inc("reassignedPosts", 1),
            Some(&mut *tx),
        )
        .await
        .at(RetirementStep::CountRetirement)?;
    if counted.is_empty() {
        return Err(StepFailure {
            step: RetirementStep::CountRetirement,
            error: ObserverError::NotFound {
                collection: Collection::Users,
                id: placeholder,
            },
        });
    }

    let scope = RetirementScope { target, placeholder };
    let removed = entities
        .execute(
            ObserverContext::delete(Collection::Users, FilterData::by_id(target)).with_metadata(scope),
            Some(&mut *tx),
        )
        .await
        .at(RetirementStep::DeleteTarget)?;
    if removed.records.is_empty() {
        return Err(StepFailure {
            step: RetirementStep::DeleteTarget,
            error: ObserverError::NotFound {
                collection: Collection::Users,
                id: target,
            },
        });
    }

    Ok(RetirementReport {
        target,
        placeholder,
        posts_reassigned: reassigned.len(),
        comments_deleted: deleted.len(),
    })
}
