use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::database::record::Record;
use crate::filter::{FilterData, FilterWhereOptions};
use crate::models::{Collection, Document, Patch};
use crate::observer::error::ObserverWarning;
use crate::observer::traits::{ObserverRing, Operation};

/// One store operation as it flows through the pipeline.
///
/// Pre-database rings work on `filter_data`, `document` and `patch`; the
/// store call fills `records` (or `count`), which post-database and audit
/// rings then observe.
#[derive(Debug)]
pub struct ObserverContext {
    pub operation: Operation,
    pub collection: Collection,

    /// Query for find/findOne/update/delete
    pub filter_data: FilterData,

    /// Read-path options set by internal callers only
    pub options: FilterWhereOptions,

    /// Document to insert (create)
    pub document: Option<Document>,

    /// Update to apply (update)
    pub patch: Option<Patch>,

    /// Count instead of loading documents (find)
    pub count_only: bool,

    // Results after the store call
    pub records: Vec<Record>,
    pub count: Option<u64>,

    // Type-safe metadata storage for cross-observer communication
    metadata: HashMap<TypeId, Box<dyn Any + Send + Sync>>,

    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,
    pub warnings: Vec<ObserverWarning>,
}

impl ObserverContext {
    fn new(operation: Operation, collection: Collection) -> Self {
        Self {
            operation,
            collection,
            filter_data: FilterData::default(),
            options: FilterWhereOptions::default(),
            document: None,
            patch: None,
            count_only: false,
            records: Vec::new(),
            count: None,
            metadata: HashMap::new(),
            start_time: Instant::now(),
            current_ring: None,
            warnings: Vec::new(),
        }
    }

    pub fn find(collection: Collection, filter_data: FilterData) -> Self {
        Self {
            filter_data,
            ..Self::new(Operation::Find, collection)
        }
    }

    pub fn find_one(collection: Collection, filter_data: FilterData) -> Self {
        Self {
            filter_data,
            ..Self::new(Operation::FindOne, collection)
        }
    }

    /// Count matches. Runs as a `find` so read-path observers still apply.
    pub fn count(collection: Collection, filter_data: FilterData) -> Self {
        Self {
            filter_data,
            count_only: true,
            ..Self::new(Operation::Find, collection)
        }
    }

    /// Insert a document; a missing `id` is generated.
    pub fn create(collection: Collection, mut document: Document) -> Self {
        if !document.contains_key("id") {
            document.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        Self {
            document: Some(document),
            ..Self::new(Operation::Create, collection)
        }
    }

    pub fn update(collection: Collection, filter_data: FilterData, patch: Patch) -> Self {
        Self {
            filter_data,
            patch: Some(patch),
            ..Self::new(Operation::Update, collection)
        }
    }

    pub fn delete(collection: Collection, filter_data: FilterData) -> Self {
        Self {
            filter_data,
            ..Self::new(Operation::Delete, collection)
        }
    }

    /// Let the read path see soft-deleted documents.
    pub fn include_deleted(mut self) -> Self {
        self.options.include_deleted = true;
        self
    }

    pub fn with_metadata<T: Send + Sync + 'static>(mut self, data: T) -> Self {
        self.set_metadata(data);
        self
    }

    /// Store typed metadata - compile-time type safety
    pub fn set_metadata<T: Send + Sync + 'static>(&mut self, data: T) {
        self.metadata.insert(TypeId::of::<T>(), Box::new(data));
    }

    /// Retrieve typed metadata - compile-time type safety
    pub fn get_metadata<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.metadata.get(&TypeId::of::<T>()).and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn has_metadata<T: Send + Sync + 'static>(&self) -> bool {
        self.metadata.contains_key(&TypeId::of::<T>())
    }

    pub fn add_warning(&mut self, warning: ObserverWarning) {
        self.warnings.push(warning);
    }

    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Ids of the documents the store call touched or returned
    pub fn record_ids(&self) -> Vec<Uuid> {
        self.records.iter().filter_map(Record::id).collect()
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.records.into_iter().map(Record::into_current).collect()
    }
}

/// Marks a user deletion as part of a retirement. Deleting a user without
/// it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetirementScope {
    pub target: Uuid,
    pub placeholder: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_assigns_missing_id() {
        let ctx = ObserverContext::create(Collection::Users, Document::new());
        let id = ctx.document.as_ref().and_then(|d| d.get("id")).and_then(Value::as_str).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn create_keeps_given_id() {
        let id = Uuid::new_v4().to_string();
        let doc = json!({ "id": id }).as_object().cloned().unwrap();
        let ctx = ObserverContext::create(Collection::Users, doc);
        assert_eq!(ctx.document.unwrap()["id"], json!(id));
    }

    #[test]
    fn metadata_is_typed() {
        let scope = RetirementScope {
            target: Uuid::new_v4(),
            placeholder: Uuid::new_v4(),
        };
        let ctx = ObserverContext::delete(Collection::Users, FilterData::by_id(scope.target)).with_metadata(scope);
        assert_eq!(ctx.get_metadata::<RetirementScope>(), Some(&scope));
        assert!(!ctx.has_metadata::<String>());
    }

    #[test]
    fn count_runs_as_find() {
        let ctx = ObserverContext::count(Collection::Comments, FilterData::default()).include_deleted();
        assert_eq!(ctx.operation, Operation::Find);
        assert!(ctx.count_only);
        assert!(ctx.options.include_deleted);
    }
}
