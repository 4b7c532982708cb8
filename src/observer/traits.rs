use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Collection;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::session::Session;

/// Observer rings with semantic meaning, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    Validation = 1,   // Input shape, reference existence
    Security = 2,     // Soft delete filtering, deletion guards
    Business = 3,     // Domain rules
    Enrichment = 4,   // Computed fields, defaults
    Database = 5,     // Store call (run by the pipeline itself)
    PostDatabase = 6, // Cascades and counters inside the same transaction
    Audit = 7,        // Read-only logging, failures are non-fatal
}

impl ObserverRing {
    pub const ALL: [ObserverRing; 7] = [
        ObserverRing::Validation,
        ObserverRing::Security,
        ObserverRing::Business,
        ObserverRing::Enrichment,
        ObserverRing::Database,
        ObserverRing::PostDatabase,
        ObserverRing::Audit,
    ];

    /// Rings that run before the store call and may abort it
    pub fn is_pre_database(&self) -> bool {
        (*self as u8) < (ObserverRing::Database as u8)
    }
}

/// Store operations the pipeline intercepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Find,
    FindOne,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Operation::Find | Operation::FindOne)
    }

    pub fn is_write(&self) -> bool {
        !self.is_read()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    fn applies_to_operation(&self, op: Operation) -> bool;

    fn applies_to_collection(&self, collection: Collection) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Rings 1-4 and 6: may mutate the context and issue nested operations
/// through the session, which is bound to the caller's transaction.
#[async_trait]
pub trait HookObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext, session: &mut Session<'_>) -> Result<(), ObserverError>;
}

/// Ring 7: observes the finished operation
#[async_trait]
pub trait AuditObserver: Observer {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError>;
}

/// Registered observer, dispatched by kind
pub enum ObserverBox {
    Hook(Box<dyn HookObserver>),
    Audit(Box<dyn AuditObserver>),
}

impl ObserverBox {
    pub fn hook(observer: impl HookObserver + 'static) -> Self {
        ObserverBox::Hook(Box::new(observer))
    }

    pub fn audit(observer: impl AuditObserver + 'static) -> Self {
        ObserverBox::Audit(Box::new(observer))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObserverBox::Hook(o) => o.name(),
            ObserverBox::Audit(o) => o.name(),
        }
    }

    pub fn ring(&self) -> ObserverRing {
        match self {
            ObserverBox::Hook(o) => o.ring(),
            ObserverBox::Audit(o) => o.ring(),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ObserverBox::Hook(o) => o.timeout(),
            ObserverBox::Audit(o) => o.timeout(),
        }
    }

    pub fn applies_to(&self, op: Operation, collection: Collection) -> bool {
        match self {
            ObserverBox::Hook(o) => o.applies_to_operation(op) && o.applies_to_collection(collection),
            ObserverBox::Audit(o) => o.applies_to_operation(op) && o.applies_to_collection(collection),
        }
    }
}
