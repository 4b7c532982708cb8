pub mod entity_store;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod schema;
pub mod store;

pub use entity_store::EntityStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{Record, RecordOperation};
pub use store::{DocumentStore, StoreError, StoreTransaction, Transaction};
