use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::database::record::Record;
use crate::database::store::{DocumentStore, StoreError, StoreTransaction};
use crate::filter::{Filter, SqlParam};
use crate::models::{document_uuid, Collection, Document, Patch};

/// Postgres-backed document store. Each collection is a table of
/// `(id uuid, doc jsonb)` rows.
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig, statement_timeout: Duration) -> Result<Self, StoreError> {
        url::Url::parse(&config.url).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect(&config.url)
            .await?;
        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(Self::from_pool(pool, statement_timeout))
    }

    pub fn from_pool(pool: PgPool, statement_timeout: Duration) -> Self {
        Self { pool, statement_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        // SET does not take bind parameters
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", self.statement_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    async fn run_control(&mut self, statement: &str) -> Result<(), StoreError> {
        sqlx::query(statement).execute(&mut *self.tx).await.map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn find(&mut self, _collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let sql = filter.to_sql();
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_doc).collect()
    }

    async fn count(&mut self, _collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let sql = filter.to_count_sql();
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&mut self, collection: Collection, mut doc: Document) -> Result<Document, StoreError> {
        let id = document_uuid(&doc, "id").ok_or(StoreError::MissingId)?;
        let now = Value::String(timestamp());
        doc.insert("createdAt".to_string(), now.clone());
        doc.insert("updatedAt".to_string(), now);

        let query = format!("INSERT INTO \"{}\" (id, doc) VALUES ($1, $2)", collection.table_name());
        let result = sqlx::query(&query)
            .bind(id)
            .bind(Json(&doc))
            .execute(&mut *self.tx)
            .await;
        match result {
            Ok(_) => Ok(doc),
            Err(e) if sql_state(&e).as_deref() == Some("23505") => Err(StoreError::Duplicate {
                collection,
                id: id.to_string(),
            }),
            Err(e) => Err(map_sqlx(e)),
        }
    }

    async fn update_many(&mut self, collection: Collection, filter: &Filter, patch: &Patch) -> Result<Vec<Record>, StoreError> {
        // Lock the matched rows, then patch in Rust so every operator has
        // one implementation across backends
        let sql = filter.to_sql_with_lock(true);
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        let before: Vec<Document> = rows.iter().map(decode_doc).collect::<Result<_, _>>()?;

        let query = format!("UPDATE \"{}\" SET doc = $1 WHERE id = $2", collection.table_name());
        let mut records = Vec::with_capacity(before.len());
        for original in before {
            let id: Uuid = document_uuid(&original, "id").ok_or(StoreError::MissingId)?;
            let mut next = original.clone();
            patch.apply(&mut next)?;
            next.insert("updatedAt".to_string(), Value::String(timestamp()));

            sqlx::query(&query)
                .bind(Json(&next))
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx)?;
            records.push(Record::updated(original, next));
        }
        Ok(records)
    }

    async fn delete_many(&mut self, _collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let sql = filter.to_delete_sql();
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_doc).collect()
    }

    async fn savepoint(&mut self, name: &'static str) -> Result<(), StoreError> {
        self.run_control(&format!("SAVEPOINT \"{}\"", name)).await
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), StoreError> {
        self.run_control(&format!("ROLLBACK TO SAVEPOINT \"{}\"", name)).await
    }

    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), StoreError> {
        self.run_control(&format!("RELEASE SAVEPOINT \"{}\"", name)).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_sqlx)
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            SqlParam::Json(value) => q.bind(Json(value)),
            SqlParam::Text(text) => q.bind(text.as_str()),
        };
    }
    q
}

fn decode_doc(row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
    let Json(value): Json<Value> = row.try_get("doc")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::QueryError(format!("stored document is not an object: {}", other))),
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn sql_state(err: &sqlx::Error) -> Option<String> {
    err.as_database_error().and_then(|e| e.code()).map(|c| c.into_owned())
}

/// Serialization failures and statement timeouts get their own variants so
/// callers can tell them from query bugs.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match sql_state(&err).as_deref() {
        Some("40001") | Some("40P01") => StoreError::Conflict(err.to_string()),
        Some("57014") => StoreError::Timeout(err.to_string()),
        _ => match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool timed out".to_string()),
            other => StoreError::Sqlx(other),
        },
    }
}
