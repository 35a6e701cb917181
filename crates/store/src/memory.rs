//! In-memory `Collection<T>` — used by tests and the CLI demo so neither
//! needs a live Postgres connection.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::collection::{Collection, Filter};
use crate::error::StoreError;
use crate::models::PersistenceId;

/// A `Collection<T>` backed by a `Mutex<HashMap<..>>`, storing each document
/// as a `serde_json::Value` so filter matching doesn't need `T` to
/// implement anything beyond `Serialize`/`DeserializeOwned`.
pub struct InMemoryCollection<T> {
    documents: Mutex<HashMap<PersistenceId, Value>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> InMemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Default for InMemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(filter: &Filter, doc: &Value) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

#[async_trait]
impl<T> Collection<T> for InMemoryCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn insert(&self, id: PersistenceId, document: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(document)?;
        self.documents.lock().unwrap().insert(id, value);
        Ok(())
    }

    async fn update(&self, id: PersistenceId, document: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(document)?;
        let mut documents = self.documents.lock().unwrap();
        if !documents.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        documents.insert(id, value);
        Ok(())
    }

    async fn get(&self, id: PersistenceId) -> Result<Option<T>, StoreError> {
        let documents = self.documents.lock().unwrap();
        match documents.get(&id) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<(PersistenceId, T)>, StoreError> {
        let documents = self.documents.lock().unwrap();
        for (id, value) in documents.iter() {
            if matches(filter, value) {
                return Ok(Some((*id, serde_json::from_value(value.clone())?)));
            }
        }
        Ok(None)
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<(PersistenceId, T)>, StoreError> {
        let documents = self.documents.lock().unwrap();
        let mut results = Vec::new();
        for (id, value) in documents.iter() {
            if matches(filter, value) {
                results.push((*id, serde_json::from_value(value.clone())?));
            }
        }
        Ok(results)
    }
}
