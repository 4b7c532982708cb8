use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::database::record::Record;
use crate::database::store::{DocumentStore, StoreError, StoreTransaction};
use crate::filter::Filter;
use crate::models::{document_uuid, Collection, Document, Patch};

type Collections = HashMap<Collection, Vec<Document>>;

/// Issues strictly increasing timestamps so creation order is total even
/// when two inserts land in the same clock tick.
#[derive(Debug)]
pub(crate) struct StoreClock {
    last: StdMutex<DateTime<Utc>>,
}

impl StoreClock {
    pub(crate) fn new() -> Self {
        Self {
            last: StdMutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub(crate) fn now(&self) -> String {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Utc::now();
        let next = if now > *last {
            now
        } else {
            *last + chrono::Duration::microseconds(1)
        };
        *last = next;
        next.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// In-process document store.
///
/// A transaction owns the store lock until it commits or rolls back, so
/// transactions are fully serialized. Writes go to a private copy that
/// replaces the shared state on commit.
pub struct MemoryStore {
    state: Arc<Mutex<Collections>>,
    lock_timeout: Duration,
    clock: Arc<StoreClock>,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout,
            clock: Arc::new(StoreClock::new()),
        }
    }

    /// Number of committed documents in a collection.
    pub async fn len(&self, collection: Collection) -> usize {
        self.state.lock().await.get(&collection).map(Vec::len).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| StoreError::Timeout(format!("store lock not acquired within {:?}", self.lock_timeout)))?;
        let working = (*guard).clone();
        debug!("memory transaction opened");
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            savepoints: Vec::new(),
            clock: self.clock.clone(),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Collections>,
    working: Collections,
    /// Snapshots of `working`, oldest first
    savepoints: Vec<(&'static str, Collections)>,
    clock: Arc<StoreClock>,
}

impl MemoryTransaction {
    fn docs(&self, collection: Collection) -> &[Document] {
        self.working.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    fn savepoint_index(&self, name: &'static str) -> Result<usize, StoreError> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| *n == name)
            .ok_or(StoreError::UnknownSavepoint(name))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find(&mut self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(filter.apply(self.docs(collection)))
    }

    async fn count(&mut self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.docs(collection).iter().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn insert(&mut self, collection: Collection, mut doc: Document) -> Result<Document, StoreError> {
        let id = document_uuid(&doc, "id").ok_or(StoreError::MissingId)?;
        let id_value = Value::String(id.to_string());
        if self.docs(collection).iter().any(|d| d.get("id") == Some(&id_value)) {
            return Err(StoreError::Duplicate {
                collection,
                id: id.to_string(),
            });
        }

        let now = Value::String(self.clock.now());
        doc.insert("createdAt".to_string(), now.clone());
        doc.insert("updatedAt".to_string(), now);
        self.working.entry(collection).or_default().push(doc.clone());
        Ok(doc)
    }

    async fn update_many(&mut self, collection: Collection, filter: &Filter, patch: &Patch) -> Result<Vec<Record>, StoreError> {
        let docs = self.working.entry(collection).or_default();

        // Compute every new version before writing any of them
        let mut changes = Vec::new();
        for (index, doc) in docs.iter().enumerate() {
            if filter.matches(doc) {
                let mut next = doc.clone();
                patch.apply(&mut next)?;
                changes.push((index, next));
            }
        }

        let mut records = Vec::with_capacity(changes.len());
        for (index, mut next) in changes {
            next.insert("updatedAt".to_string(), Value::String(self.clock.now()));
            let before = std::mem::replace(&mut docs[index], next.clone());
            records.push(Record::updated(before, next));
        }
        Ok(records)
    }

    async fn delete_many(&mut self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let docs = self.working.entry(collection).or_default();
        let (removed, kept): (Vec<Document>, Vec<Document>) = docs.drain(..).partition(|d| filter.matches(d));
        *docs = kept;
        Ok(removed)
    }

    async fn savepoint(&mut self, name: &'static str) -> Result<(), StoreError> {
        self.savepoints.push((name, self.working.clone()));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), StoreError> {
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index + 1);
        self.working = self.savepoints[index].1.clone();
        debug!("memory transaction rolled back to savepoint {}", name);
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), StoreError> {
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        debug!("memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!("memory transaction rolled back");
        Ok(())
    }
}
