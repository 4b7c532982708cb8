use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::database::record::Record;
use crate::database::StoreTransaction;
use crate::filter::{Filter, FilterError};
use crate::models::Collection;
use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::implementations;
use crate::observer::monitor::{QueryMonitor, QueryReport, TracingMonitor};
use crate::observer::session::Session;
use crate::observer::traits::{ObserverBox, ObserverRing, Operation};

/// Ring-ordered interception pipeline.
///
/// Every store operation runs through `execute`: pre-database rings
/// (1-4) may rewrite or veto it, ring 5 is the store call, ring 6 derives
/// side effects inside the same transaction and ring 7 observes. The
/// monitor receives exactly one report per execution.
pub struct ObserverPipeline {
    // Observer registry by ring
    observers: HashMap<ObserverRing, Vec<ObserverBox>>,
    monitor: Arc<dyn QueryMonitor>,

    // Configuration
    max_recursion_depth: usize,
    max_query_limit: Option<i64>,
}

impl ObserverPipeline {
    /// Create new observer pipeline with empty observer registry
    /// Observers will be registered via register_observer()
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
            monitor: Arc::new(TracingMonitor::default()),
            max_recursion_depth: 3,
            max_query_limit: None,
        }
    }

    /// Pipeline with the built-in observers registered for `config`
    pub fn standard(config: &AppConfig, monitor: Arc<dyn QueryMonitor>) -> Result<Self, ObserverError> {
        let mut pipeline = Self::new()
            .with_monitor(monitor)
            .with_max_recursion_depth(config.observer.max_recursion_depth)
            .with_max_query_limit(config.filter.max_limit);
        implementations::register_standard(&mut pipeline, config)?;
        Ok(pipeline)
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_max_query_limit(mut self, limit: Option<i64>) -> Self {
        self.max_query_limit = limit;
        self
    }

    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }

    /// Register an observer. The database ring is reserved for the store
    /// call and audit observers only run on the audit ring.
    pub fn register_observer(&mut self, observer: ObserverBox) -> Result<(), ObserverError> {
        let ring = observer.ring();
        let name = observer.name();
        let misplaced = match &observer {
            ObserverBox::Hook(_) => matches!(ring, ObserverRing::Database | ObserverRing::Audit),
            ObserverBox::Audit(_) => ring != ObserverRing::Audit,
        };
        if misplaced {
            return Err(ObserverError::SystemError(format!(
                "Observer {} cannot be registered on ring {:?}",
                name, ring
            )));
        }

        self.observers.entry(ring).or_default().push(observer);
        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
        Ok(())
    }

    /// Names of the observers registered on a ring, in execution order
    pub fn observer_names(&self, ring: ObserverRing) -> Vec<&'static str> {
        self.observers
            .get(&ring)
            .map(|observers| observers.iter().map(ObserverBox::name).collect())
            .unwrap_or_default()
    }

    /// Run one operation through every ring against `tx`.
    ///
    /// `depth` is 0 for caller-issued operations; observers issue nested
    /// operations through their `Session` at increasing depth.
    pub fn execute<'a>(
        &'a self,
        mut ctx: ObserverContext,
        tx: &'a mut dyn StoreTransaction,
        depth: usize,
    ) -> BoxFuture<'a, Result<ObserverContext, ObserverError>> {
        Box::pin(async move {
            let report = PendingReport::start(self.monitor.as_ref(), &ctx, depth);
            let result = if depth > self.max_recursion_depth {
                Err(ObserverError::RecursionError {
                    depth,
                    max_depth: self.max_recursion_depth,
                })
            } else {
                self.run_rings(&mut ctx, tx, depth).await
            };

            report.finish(result.is_ok());
            result.map(|_| ctx)
        })
    }

    async fn run_rings(&self, ctx: &mut ObserverContext, tx: &mut dyn StoreTransaction, depth: usize) -> Result<(), ObserverError> {
        tracing::debug!(
            "Observer pipeline starting: operation={}, collection={}, depth={}",
            ctx.operation,
            ctx.collection,
            depth
        );

        for ring in ObserverRing::ALL {
            ctx.current_ring = Some(ring);
            match ring {
                ObserverRing::Database => self.execute_database(ctx, &mut *tx).await?,
                ObserverRing::Audit => self.execute_audit(ctx).await,
                _ => self.execute_ring(ring, ctx, &mut *tx, depth).await?,
            }
        }
        Ok(())
    }

    /// Execute hook observers in a specific ring. The first failure stops
    /// the operation.
    async fn execute_ring(
        &self,
        ring: ObserverRing,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
        depth: usize,
    ) -> Result<(), ObserverError> {
        let observers = match self.observers.get(&ring) {
            Some(obs) => obs,
            None => return Ok(()),
        };

        for observer in observers {
            let hook = match observer {
                ObserverBox::Hook(hook) => hook,
                ObserverBox::Audit(_) => continue,
            };
            if !observer.applies_to(ctx.operation, ctx.collection) {
                tracing::trace!(
                    "Observer {} skipped for {} on {}",
                    observer.name(),
                    ctx.operation,
                    ctx.collection
                );
                continue;
            }

            let observer_start = Instant::now();
            let mut session = Session::new(self, &mut *tx, depth + 1);

            // Execute with timeout protection
            let result = timeout(observer.timeout(), hook.execute(ctx, &mut session)).await;
            let execution_time = observer_start.elapsed();

            match result {
                Ok(Ok(())) => {
                    tracing::debug!("Observer: {} completed successfully in {:?}", observer.name(), execution_time);
                }
                Ok(Err(error)) => {
                    tracing::warn!("Observer: {} failed in {:?}: {}", observer.name(), execution_time, error);
                    return Err(error);
                }
                Err(_elapsed) => {
                    tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
                    return Err(ObserverError::TimeoutError(format!(
                        "Observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ring 5: the store call itself
    async fn execute_database(&self, ctx: &mut ObserverContext, tx: &mut dyn StoreTransaction) -> Result<(), ObserverError> {
        let collection = ctx.collection;
        match ctx.operation {
            Operation::Find if ctx.count_only => {
                let filter = where_only(ctx)?;
                ctx.count = Some(tx.count(collection, &filter).await?);
            }
            Operation::Find => {
                let filter = Filter::from_data(collection.table_name(), &ctx.filter_data, self.max_query_limit)?;
                let docs = tx.find(collection, &filter).await?;
                ctx.records = docs.into_iter().map(Record::selected).collect();
            }
            Operation::FindOne => {
                let mut filter = Filter::from_data(collection.table_name(), &ctx.filter_data, None)?;
                filter.limit(Some(1), ctx.filter_data.offset)?;
                let docs = tx.find(collection, &filter).await?;
                ctx.records = docs.into_iter().map(Record::selected).collect();
            }
            Operation::Create => {
                let doc = ctx
                    .document
                    .take()
                    .ok_or_else(|| ObserverError::ValidationError("create requires a document".to_string()))?;
                let stored = tx.insert(collection, doc).await?;
                ctx.records = vec![Record::created(stored)];
            }
            Operation::Update => {
                let filter = where_only(ctx)?;
                let patch = ctx
                    .patch
                    .as_ref()
                    .ok_or_else(|| ObserverError::ValidationError("update requires a patch".to_string()))?;
                ctx.records = tx.update_many(collection, &filter, patch).await?;
            }
            Operation::Delete => {
                let filter = where_only(ctx)?;
                let removed = tx.delete_many(collection, &filter).await?;
                ctx.records = removed.into_iter().map(Record::deleted).collect();
            }
        }
        Ok(())
    }

    /// Ring 7: failures are recorded as warnings and never fail the operation
    async fn execute_audit(&self, ctx: &mut ObserverContext) {
        let observers = match self.observers.get(&ObserverRing::Audit) {
            Some(obs) => obs,
            None => return,
        };

        let mut warnings = Vec::new();
        for observer in observers {
            let audit = match observer {
                ObserverBox::Audit(audit) => audit,
                ObserverBox::Hook(_) => continue,
            };
            if !observer.applies_to(ctx.operation, ctx.collection) {
                continue;
            }

            let failure = match timeout(observer.timeout(), audit.execute(&*ctx)).await {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error.to_string()),
                Err(_elapsed) => Some(format!("timed out after {:?}", observer.timeout())),
            };
            if let Some(message) = failure {
                tracing::warn!("Audit observer {} failed: {}", observer.name(), message);
                warnings.push(ObserverWarning::new(observer.name(), ObserverRing::Audit, message));
            }
        }
        ctx.warnings.extend(warnings);
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter without paging, for counts and bulk writes
fn where_only(ctx: &ObserverContext) -> Result<Filter, FilterError> {
    let mut filter = Filter::new(ctx.collection.table_name())?;
    if let Some(where_clause) = &ctx.filter_data.where_clause {
        filter.where_clause(where_clause)?;
    }
    Ok(filter)
}

/// The monitor report of an execution in flight. Dropping it unfinished,
/// as when the caller cancels the execution future, records a failure.
struct PendingReport<'m> {
    monitor: &'m dyn QueryMonitor,
    collection: Collection,
    operation: Operation,
    depth: usize,
    started: Instant,
    recorded: bool,
}

impl<'m> PendingReport<'m> {
    fn start(monitor: &'m dyn QueryMonitor, ctx: &ObserverContext, depth: usize) -> Self {
        Self {
            monitor,
            collection: ctx.collection,
            operation: ctx.operation,
            depth,
            started: Instant::now(),
            recorded: false,
        }
    }

    fn finish(mut self, success: bool) {
        self.record(success);
    }

    fn record(&mut self, success: bool) {
        self.recorded = true;
        self.monitor.record(&QueryReport {
            collection: self.collection,
            operation: self.operation,
            duration: self.started.elapsed(),
            success,
            depth: self.depth,
        });
    }
}

impl Drop for PendingReport<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            tracing::warn!(
                "Observer pipeline cancelled: operation={}, collection={}, depth={}",
                self.operation,
                self.collection,
                self.depth
            );
            self.record(false);
        }
    }
}
