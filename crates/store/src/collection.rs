//! The persistence collection contract (§6): `insert`/`update`/`find_one`/
//! `find`, deliberately minimal and MongoDB-shaped. A `Filter` is a JSON
//! object matched by top-level field equality — no query language, no
//! indexes, no nested-path matching.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::models::PersistenceId;

/// A filter is a flat JSON object; a document matches when every key in the
/// filter is present in the document with an equal value.
pub type Filter = serde_json::Map<String, Value>;

/// A homogeneous collection of documents of type `T`, addressed by
/// caller-assigned [`PersistenceId`].
#[async_trait]
pub trait Collection<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Insert a new document under `id`. Implementations may treat a
    /// reused id as an error or a silent overwrite; callers always assign a
    /// fresh [`PersistenceId::new`].
    async fn insert(&self, id: PersistenceId, document: &T) -> Result<(), StoreError>;

    /// Replace the document stored under `id`.
    async fn update(&self, id: PersistenceId, document: &T) -> Result<(), StoreError>;

    /// Fetch a single document by id.
    async fn get(&self, id: PersistenceId) -> Result<Option<T>, StoreError>;

    /// Fetch the first document matching `filter`, in no particular order.
    async fn find_one(&self, filter: &Filter) -> Result<Option<(PersistenceId, T)>, StoreError>;

    /// Fetch every document matching `filter`.
    async fn find(&self, filter: &Filter) -> Result<Vec<(PersistenceId, T)>, StoreError>;
}
