/// Document store boundary: the trait the core reads and writes through,
/// an ordered in-process implementation, and a timeout wrapper.
///
/// Collections hold JSON documents addressed by string keys. Sub-collections
/// live under `"<collection>/<key>/<name>"`.
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::RoutingError;

const AUTO_ID_LEN: usize = 20;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Backend(String),

    #[error("seed io: {0}")]
    Io(#[from] std::io::Error),

    #[error("seed json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A document together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub id: String,
    pub data: Value,
}

impl StoredDoc {
    /// Deserialize the document body into its schema type.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T, RoutingError> {
        serde_json::from_value(self.data.clone()).map_err(|e| RoutingError::Corrupt {
            collection: collection.to_string(),
            key: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Field-equality filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }

    fn matches(&self, data: &Value) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

pub fn sub_collection(collection: &str, key: &str, name: &str) -> String {
    format!("{}/{}/{}", collection, key, name)
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in key order.
    async fn get_all(&self, collection: &str) -> Result<Vec<StoredDoc>, StoreError>;

    /// Documents matching all filters, in key order, truncated to `limit`.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc>, StoreError>;

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDoc>, StoreError>;

    /// Create or overwrite the document at `key`.
    async fn set(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError>;

    /// Write the document at `key` only if none exists there, as one step.
    /// Returns whether it was written.
    async fn create(&self, collection: &str, key: &str, data: Value) -> Result<bool, StoreError>;

    /// Insert under a freshly generated key and return it.
    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Remove the document at `key`. Returns whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError>;
}

// ── In-process store ─────────────────────────────────────────────────

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Ordered in-memory document store. Iteration follows key order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `{ "<collection>": { "<key>": {..document..} } }`.
    pub fn from_seed(seed: Value) -> Result<Self, StoreError> {
        let Value::Object(top) = seed else {
            return Err(StoreError::Backend("seed must be a JSON object".into()));
        };

        let mut collections = Collections::new();
        for (name, docs) in top {
            let Value::Object(docs) = docs else {
                return Err(StoreError::Backend(format!(
                    "seed collection {} must be an object keyed by document id",
                    name
                )));
            };
            collections.insert(name, docs.into_iter().collect());
        }

        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    pub async fn load_seed_file(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        let seed: Value = serde_json::from_str(&content)?;
        Self::from_seed(seed)
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

fn to_docs<'a>(iter: impl Iterator<Item = (&'a String, &'a Value)>) -> Vec<StoredDoc> {
    iter.map(|(id, data)| StoredDoc {
        id: id.clone(),
        data: data.clone(),
    })
    .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<StoredDoc>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| to_docs(docs.iter()))
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let matching = docs
            .iter()
            .filter(|(_, data)| filters.iter().all(|f| f.matches(data)))
            .take(limit.unwrap_or(usize::MAX));
        Ok(to_docs(matching))
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDoc>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|data| StoredDoc {
                id: key.to_string(),
                data: data.clone(),
            }))
    }

    async fn set(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn create(&self, collection: &str, key: &str, data: Value) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(key) {
            return Ok(false);
        }
        docs.insert(key.to_string(), data);
        Ok(true)
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let id = loop {
            let candidate = generate_id();
            if !docs.contains_key(&candidate) {
                break candidate;
            }
        };
        docs.insert(id.clone(), data);
        Ok(id)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }
}

// ── Timeout wrapper ──────────────────────────────────────────────────

/// Bounds every call on the wrapped store. No retries.
pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    limit: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.limit, call)
            .await
            .map_err(|_| StoreError::Timeout(self.limit))?
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<StoredDoc>, StoreError> {
        self.bounded(self.inner.get_all(collection)).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc>, StoreError> {
        self.bounded(self.inner.query(collection, filters, limit)).await
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDoc>, StoreError> {
        self.bounded(self.inner.get(collection, key)).await
    }

    async fn set(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError> {
        self.bounded(self.inner.set(collection, key, data)).await
    }

    async fn create(&self, collection: &str, key: &str, data: Value) -> Result<bool, StoreError> {
        self.bounded(self.inner.create(collection, key, data)).await
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        self.bounded(self.inner.add(collection, data)).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        self.bounded(self.inner.delete(collection, key)).await
    }
}
