//! Postgres/JSONB-backed `Collection<T>`.
//!
//! Every document type shares the same two-column schema — `id uuid`,
//! `body jsonb` — so `PgCollection<T>` is generic over `T` and uses
//! runtime-checked `sqlx::query`/`query_as` rather than the `query_as!`
//! compile-time macro (which needs a concrete row type per call site and
//! can't be generic over `T`). Filtering uses JSONB containment (`@>`),
//! which is exact for the top-level-equality `Filter` shape this contract
//! promises.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;

use crate::collection::{Collection, Filter};
use crate::error::StoreError;
use crate::models::{DocumentRow, PersistenceId};

/// A `Collection<T>` backed by a single Postgres table of shape
/// `(id uuid primary key, body jsonb, created_at timestamptz)`.
pub struct PgCollection<T> {
    pool: PgPool,
    table: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T> PgCollection<T> {
    /// `table` must be a trusted, hard-coded identifier — it is interpolated
    /// directly into the SQL text since Postgres doesn't allow binding table
    /// names as parameters. Never construct one from user input.
    pub fn new(pool: PgPool, table: &'static str) -> Self {
        Self {
            pool,
            table,
            _marker: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T> Collection<T> for PgCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn insert(&self, id: PersistenceId, document: &T) -> Result<(), StoreError> {
        let body = serde_json::to_value(document)?;
        let sql = format!(
            "INSERT INTO {} (id, body, created_at) VALUES ($1, $2, now())",
            self.table
        );
        sqlx::query(&sql)
            .bind(id.0)
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, id: PersistenceId, document: &T) -> Result<(), StoreError> {
        let body = serde_json::to_value(document)?;
        let sql = format!("UPDATE {} SET body = $1 WHERE id = $2", self.table);
        let result = sqlx::query(&sql).bind(body).bind(id.0).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, id: PersistenceId) -> Result<Option<T>, StoreError> {
        let sql = format!("SELECT id, body FROM {} WHERE id = $1", self.table);
        let row: Option<DocumentRow> = sqlx::query_as(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_value(row.body)?)),
            None => Ok(None),
        }
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<(PersistenceId, T)>, StoreError> {
        let sql = format!("SELECT id, body FROM {} WHERE body @> $1 LIMIT 1", self.table);
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(serde_json::Value::Object(filter.clone()))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some((PersistenceId(row.id), serde_json::from_value(row.body)?))),
            None => Ok(None),
        }
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<(PersistenceId, T)>, StoreError> {
        let sql = format!("SELECT id, body FROM {} WHERE body @> $1", self.table);
        let rows: Vec<DocumentRow> = sqlx::query_as(&sql)
            .bind(serde_json::Value::Object(filter.clone()))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Ok((PersistenceId(row.id), serde_json::from_value(row.body)?)))
            .collect()
    }
}
