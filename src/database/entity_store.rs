use std::sync::Arc;

use uuid::Uuid;

use crate::database::record::Record;
use crate::database::store::{DocumentStore, Transaction};
use crate::filter::FilterData;
use crate::models::{Collection, Document, Entity, Patch};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::pipeline::ObserverPipeline;

/// Keyed access to the four entity collections.
///
/// Every call runs through the observer pipeline. Passing `Some(&mut tx)`
/// keeps the effects inside that transaction until it commits; `None`
/// wraps the single operation in its own transaction.
#[derive(Clone)]
pub struct EntityStore {
    store: Arc<dyn DocumentStore>,
    pipeline: Arc<ObserverPipeline>,
}

impl EntityStore {
    pub fn new(store: Arc<dyn DocumentStore>, pipeline: Arc<ObserverPipeline>) -> Self {
        Self { store, pipeline }
    }

    pub fn pipeline(&self) -> &ObserverPipeline {
        &self.pipeline
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    pub async fn begin(&self) -> Result<Transaction, ObserverError> {
        Ok(self.store.begin().await?)
    }

    /// Run a prepared context through the pipeline.
    pub async fn execute(&self, ctx: ObserverContext, tx: Option<&mut Transaction>) -> Result<ObserverContext, ObserverError> {
        if let Some(tx) = tx {
            return self.pipeline.execute(ctx, tx.as_mut(), 0).await;
        }

        let mut tx = self.store.begin().await?;
        match self.pipeline.execute(ctx, tx.as_mut(), 0).await {
            Ok(ctx) => {
                tx.commit().await?;
                Ok(ctx)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!("Rollback after failed operation also failed: {}", rollback_error);
                }
                Err(error)
            }
        }
    }

    pub async fn get(&self, collection: Collection, id: Uuid, tx: Option<&mut Transaction>) -> Result<Document, ObserverError> {
        self.find_one(collection, FilterData::by_id(id), tx)
            .await?
            .ok_or(ObserverError::NotFound { collection, id })
    }

    pub async fn find_one(
        &self,
        collection: Collection,
        filter: FilterData,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<Document>, ObserverError> {
        let ctx = self.execute(ObserverContext::find_one(collection, filter), tx).await?;
        Ok(ctx.into_documents().into_iter().next())
    }

    pub async fn query(&self, collection: Collection, filter: FilterData, tx: Option<&mut Transaction>) -> Result<Vec<Document>, ObserverError> {
        let ctx = self.execute(ObserverContext::find(collection, filter), tx).await?;
        Ok(ctx.into_documents())
    }

    /// Number of matches; paging in `filter` is ignored.
    pub async fn count(&self, collection: Collection, filter: FilterData, tx: Option<&mut Transaction>) -> Result<u64, ObserverError> {
        let ctx = self.execute(ObserverContext::count(collection, filter), tx).await?;
        Ok(ctx.count.unwrap_or(0))
    }

    pub async fn create(&self, collection: Collection, doc: Document, tx: Option<&mut Transaction>) -> Result<Document, ObserverError> {
        let ctx = self.execute(ObserverContext::create(collection, doc), tx).await?;
        ctx.into_documents()
            .into_iter()
            .next()
            .ok_or_else(|| ObserverError::SystemError(format!("create on {} returned no document", collection)))
    }

    pub async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Patch,
        tx: Option<&mut Transaction>,
    ) -> Result<Document, ObserverError> {
        let ctx = self
            .execute(ObserverContext::update(collection, FilterData::by_id(id), patch), tx)
            .await?;
        ctx.into_documents()
            .into_iter()
            .next()
            .ok_or(ObserverError::NotFound { collection, id })
    }

    /// Apply `patch` to every match; returns before/after pairs.
    pub async fn update_many(
        &self,
        collection: Collection,
        filter: FilterData,
        patch: Patch,
        tx: Option<&mut Transaction>,
    ) -> Result<Vec<Record>, ObserverError> {
        Ok(self.execute(ObserverContext::update(collection, filter, patch), tx).await?.records)
    }

    pub async fn delete(&self, collection: Collection, id: Uuid, tx: Option<&mut Transaction>) -> Result<Document, ObserverError> {
        self.delete_many(collection, FilterData::by_id(id), tx)
            .await?
            .into_iter()
            .next()
            .ok_or(ObserverError::NotFound { collection, id })
    }

    pub async fn delete_many(
        &self,
        collection: Collection,
        filter: FilterData,
        tx: Option<&mut Transaction>,
    ) -> Result<Vec<Document>, ObserverError> {
        Ok(self.execute(ObserverContext::delete(collection, filter), tx).await?.into_documents())
    }

    // Typed helpers

    pub async fn get_entity<T: Entity>(&self, id: Uuid, tx: Option<&mut Transaction>) -> Result<T, ObserverError> {
        Ok(T::from_document(self.get(T::COLLECTION, id, tx).await?)?)
    }

    pub async fn query_entities<T: Entity>(&self, filter: FilterData, tx: Option<&mut Transaction>) -> Result<Vec<T>, ObserverError> {
        self.query(T::COLLECTION, filter, tx)
            .await?
            .into_iter()
            .map(|doc| T::from_document(doc).map_err(ObserverError::from))
            .collect()
    }

    pub async fn create_entity<T: Entity>(&self, entity: &T, tx: Option<&mut Transaction>) -> Result<T, ObserverError> {
        let doc = self.create(T::COLLECTION, entity.to_document()?, tx).await?;
        Ok(T::from_document(doc)?)
    }

    pub async fn update_entity<T: Entity>(&self, id: Uuid, patch: Patch, tx: Option<&mut Transaction>) -> Result<T, ObserverError> {
        let doc = self.update(T::COLLECTION, id, patch, tx).await?;
        Ok(T::from_document(doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::User;
    use crate::observer::monitor::MemoryMonitor;

    fn store(monitor: Arc<MemoryMonitor>) -> EntityStore {
        let pipeline = ObserverPipeline::new().with_monitor(monitor);
        EntityStore::new(Arc::new(MemoryStore::default()), Arc::new(pipeline))
    }

    #[tokio::test]
    async fn autocommit_operations_are_visible_afterwards() {
        let entities = store(Arc::new(MemoryMonitor::new()));
        let user = User::new("ada", "ada@example.com", "Ada", "Lovelace");
        entities.create_entity(&user, None).await.unwrap();

        let loaded: User = entities.get_entity(user.id, None).await.unwrap();
        assert_eq!(loaded.username, "ada");
    }

    #[tokio::test]
    async fn transaction_effects_disappear_on_rollback() {
        let entities = store(Arc::new(MemoryMonitor::new()));
        let user = User::new("ada", "ada@example.com", "Ada", "Lovelace");

        let mut tx = entities.begin().await.unwrap();
        entities.create_entity(&user, Some(&mut tx)).await.unwrap();
        assert_eq!(entities.count(Collection::Users, FilterData::default(), Some(&mut tx)).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        let missing = entities.get(Collection::Users, user.id, None).await;
        assert!(matches!(missing, Err(ObserverError::NotFound { .. })));
    }

    #[tokio::test]
    async fn every_call_reports_once() {
        let monitor = Arc::new(MemoryMonitor::new());
        let entities = store(monitor.clone());
        let id = Uuid::new_v4();

        let _ = entities.get(Collection::Posts, id, None).await;
        let _ = entities.delete(Collection::Posts, id, None).await;
        assert_eq!(monitor.len(), 2);
    }
}
