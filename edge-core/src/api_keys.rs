/// API keys issued per domain and checked by edge nodes.
use chrono::Utc;
use edge_proto::records::{default_key_name, ApiKey, API_KEYS};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

use crate::domains::to_document;
use crate::error::{Result, RoutingError};
use crate::store::{DocumentStore, Filter};

const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn DocumentStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Issue a new active key for `domain`. The caller checks ownership.
    pub async fn issue(&self, domain: &str, name: Option<&str>) -> Result<ApiKey> {
        let mut key = ApiKey {
            id: String::new(),
            key: generate_key(),
            domain: domain.to_string(),
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(default_key_name),
            active: true,
            created_at: Some(Utc::now().to_rfc3339()),
        };
        key.id = self
            .store
            .add(API_KEYS, to_document(API_KEYS, "", &key)?)
            .await?;
        tracing::info!(domain, key_id = %key.id, "API key issued");
        Ok(key)
    }

    pub async fn list(&self, domain: &str) -> Result<Vec<ApiKey>> {
        self.store
            .query(API_KEYS, &[Filter::eq("dominio", domain)], None)
            .await?
            .into_iter()
            .map(|doc| -> Result<ApiKey> {
                let mut key: ApiKey = doc.decode(API_KEYS)?;
                key.id = doc.id;
                Ok(key)
            })
            .collect()
    }

    /// Delete `key_id`. Keys belonging to another domain count as absent.
    pub async fn revoke(&self, domain: &str, key_id: &str) -> Result<()> {
        let doc = self
            .store
            .get(API_KEYS, key_id)
            .await?
            .ok_or_else(|| RoutingError::NotFound(format!("api key {}", key_id)))?;
        let key: ApiKey = doc.decode(API_KEYS)?;
        if key.domain != domain {
            return Err(RoutingError::NotFound(format!("api key {}", key_id)));
        }
        self.store.delete(API_KEYS, key_id).await?;
        tracing::info!(domain, key_id, "API key revoked");
        Ok(())
    }

    /// Whether `key` is an active key for `domain`.
    pub async fn validate(&self, domain: &str, key: &str) -> Result<bool> {
        if domain.trim().is_empty() || key.trim().is_empty() {
            return Err(RoutingError::InvalidInput("domain and api key are required".into()));
        }
        let found = self
            .store
            .query(
                API_KEYS,
                &[
                    Filter::eq("key", key),
                    Filter::eq("dominio", domain),
                    Filter::eq("activa", true),
                ],
                Some(1),
            )
            .await?;
        Ok(!found.is_empty())
    }
}

fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN)
        .map(char::from)
        .collect()
}
