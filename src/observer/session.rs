use futures::future::BoxFuture;
use uuid::Uuid;

use crate::database::record::Record;
use crate::database::StoreTransaction;
use crate::filter::FilterData;
use crate::models::{Collection, Document, Patch};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::pipeline::ObserverPipeline;

/// Handle for issuing operations inside the current transaction.
///
/// Everything sent through a session runs the full pipeline again, one
/// level deeper, against the same transaction as the triggering operation.
pub struct Session<'a> {
    pipeline: &'a ObserverPipeline,
    tx: &'a mut dyn StoreTransaction,
    depth: usize,
}

impl<'a> Session<'a> {
    pub fn new(pipeline: &'a ObserverPipeline, tx: &'a mut dyn StoreTransaction, depth: usize) -> Self {
        Self { pipeline, tx, depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub async fn savepoint(&mut self, name: &'static str) -> Result<(), ObserverError> {
        Ok(self.tx.savepoint(name).await?)
    }

    pub async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), ObserverError> {
        Ok(self.tx.rollback_to_savepoint(name).await?)
    }

    pub async fn release_savepoint(&mut self, name: &'static str) -> Result<(), ObserverError> {
        Ok(self.tx.release_savepoint(name).await?)
    }

    /// Run a fully built context through the pipeline.
    pub fn run(&mut self, ctx: ObserverContext) -> BoxFuture<'_, Result<ObserverContext, ObserverError>> {
        self.pipeline.execute(ctx, &mut *self.tx, self.depth)
    }

    pub async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, ObserverError> {
        Ok(self.run(ObserverContext::find(collection, filter)).await?.into_documents())
    }

    pub async fn find_one(&mut self, collection: Collection, filter: FilterData) -> Result<Option<Document>, ObserverError> {
        let ctx = self.run(ObserverContext::find_one(collection, filter)).await?;
        Ok(ctx.into_documents().into_iter().next())
    }

    pub async fn get(&mut self, collection: Collection, id: Uuid) -> Result<Document, ObserverError> {
        self.find_one(collection, FilterData::by_id(id))
            .await?
            .ok_or(ObserverError::NotFound { collection, id })
    }

    pub async fn count(&mut self, collection: Collection, filter: FilterData) -> Result<u64, ObserverError> {
        let ctx = self.run(ObserverContext::count(collection, filter)).await?;
        Ok(ctx.count.unwrap_or(0))
    }

    pub async fn exists(&mut self, collection: Collection, id: Uuid) -> Result<bool, ObserverError> {
        Ok(self.count(collection, FilterData::by_id(id)).await? > 0)
    }

    pub async fn create(&mut self, collection: Collection, doc: Document) -> Result<Document, ObserverError> {
        let ctx = self.run(ObserverContext::create(collection, doc)).await?;
        ctx.into_documents()
            .into_iter()
            .next()
            .ok_or_else(|| ObserverError::SystemError(format!("create on {} returned no document", collection)))
    }

    pub async fn update_many(&mut self, collection: Collection, filter: FilterData, patch: Patch) -> Result<Vec<Record>, ObserverError> {
        Ok(self.run(ObserverContext::update(collection, filter, patch)).await?.records)
    }

    pub async fn update(&mut self, collection: Collection, id: Uuid, patch: Patch) -> Result<Document, ObserverError> {
        let ctx = self.run(ObserverContext::update(collection, FilterData::by_id(id), patch)).await?;
        ctx.into_documents()
            .into_iter()
            .next()
            .ok_or(ObserverError::NotFound { collection, id })
    }

    pub async fn delete_many(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, ObserverError> {
        Ok(self.run(ObserverContext::delete(collection, filter)).await?.into_documents())
    }

    pub async fn delete(&mut self, collection: Collection, id: Uuid) -> Result<Document, ObserverError> {
        self.delete_many(collection, FilterData::by_id(id))
            .await?
            .into_iter()
            .next()
            .ok_or(ObserverError::NotFound { collection, id })
    }
}
