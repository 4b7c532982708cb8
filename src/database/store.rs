use async_trait::async_trait;
use thiserror::Error;

use crate::database::record::Record;
use crate::filter::{Filter, FilterError};
use crate::models::{Collection, Document, ModelError, Patch};

/// Errors raised by document store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate id in {collection}: {id}")]
    Duplicate { collection: Collection, id: String },

    #[error("Document is missing a valid id")]
    MissingId,

    #[error("Transaction timed out: {0}")]
    Timeout(String),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("No savepoint named {0}")]
    UnknownSavepoint(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Storage backend for the four entity collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Open a transaction. Every read and write goes through one; effects
    /// become visible to others only on commit.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// Operations available inside a transaction.
///
/// `update_many` and `delete_many` ignore the filter's paging: they act on
/// every matching document.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find(&mut self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn count(&mut self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert a document; the store assigns `createdAt` / `updatedAt`.
    async fn insert(&mut self, collection: Collection, doc: Document) -> Result<Document, StoreError>;

    async fn update_many(&mut self, collection: Collection, filter: &Filter, patch: &Patch) -> Result<Vec<Record>, StoreError>;

    /// Remove every match and return the removed documents.
    async fn delete_many(&mut self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Mark a point that later work can be undone back to without
    /// abandoning the transaction. Names may repeat; the latest wins.
    async fn savepoint(&mut self, name: &'static str) -> Result<(), StoreError>;

    /// Undo everything since the latest savepoint `name`, keeping it.
    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), StoreError>;

    /// Forget the latest savepoint `name`, keeping its work.
    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

pub type Transaction = Box<dyn StoreTransaction>;
