/// Domain registry: registration, ownership checks, verification, and the
/// per-path URL configs stored under each legacy domain record.
use chrono::Utc;
use edge_proto::records::{
    default_auth_method, default_cache_size_mb, LegacyDomainRecord, UrlConfig, API_KEYS, DOMAINS,
    DOMAIN_URLS,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, RoutingError};
use crate::origin::load_urls;
use crate::reserved::ReservedNames;
use crate::store::{sub_collection, DocumentStore, Filter};

const TOKEN_PREFIX: &str = "verify-";
const TOKEN_LEN: usize = 13;
const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub record: LegacyDomainRecord,
    /// What the owner must publish to prove control of the domain.
    pub instructions: String,
}

/// Body of a new per-path URL config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUrlConfig {
    #[serde(default)]
    pub path: String,
    #[serde(rename = "tamanio_cache_mb", default)]
    pub cache_size_mb: Option<u32>,
    #[serde(rename = "tipos_archivo", default)]
    pub allowed_file_types: Option<Value>,
    #[serde(rename = "metodo_autenticacion", default)]
    pub auth_method: Option<String>,
}

#[derive(Clone)]
pub struct DomainRegistry {
    store: Arc<dyn DocumentStore>,
    reserved: Arc<ReservedNames>,
}

impl DomainRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, reserved: Arc<ReservedNames>) -> Self {
        Self { store, reserved }
    }

    /// Register `name` for `owner`, unverified.
    ///
    /// `origin` must be an absolute http(s) URL when given; a blank or
    /// missing origin defaults to `http://<name>`.
    pub async fn register(
        &self,
        owner: &str,
        name: &str,
        origin: Option<&str>,
    ) -> Result<Registration> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoutingError::InvalidInput("domain name is required".into()));
        }
        if self.reserved.contains(name) {
            return Err(RoutingError::ReservedName(name.to_string()));
        }

        let existing = self
            .store
            .query(DOMAINS, &[Filter::eq("nombre", name)], Some(1))
            .await?;
        if !existing.is_empty() {
            return Err(RoutingError::AlreadyRegistered(name.to_string()));
        }

        let origin = match origin.map(str::trim).filter(|o| !o.is_empty()) {
            Some(origin) => validate_origin(origin)?,
            None => format!("http://{}", name),
        };

        let token = generate_token();
        let record = LegacyDomainRecord {
            domain: name.to_string(),
            owner_id: owner.to_string(),
            verified: false,
            verification_token: Some(token.clone()),
            origin: Some(origin),
            created_at: Some(Utc::now().to_rfc3339()),
        };
        // The lookup above misses a registration racing this one; create does not.
        let created = self
            .store
            .create(DOMAINS, name, to_document(DOMAINS, name, &record)?)
            .await?;
        if !created {
            return Err(RoutingError::AlreadyRegistered(name.to_string()));
        }

        tracing::info!(domain = name, owner, "Domain registered");
        Ok(Registration {
            record,
            instructions: format!("Agregar registro TXT: {}", token),
        })
    }

    /// Domains owned by `owner`, in key order.
    pub async fn list(&self, owner: &str) -> Result<Vec<LegacyDomainRecord>> {
        self.store
            .query(DOMAINS, &[Filter::eq("propietario_id", owner)], None)
            .await?
            .iter()
            .map(|doc| doc.decode::<LegacyDomainRecord>(DOMAINS))
            .collect()
    }

    pub async fn get(&self, name: &str) -> Result<LegacyDomainRecord> {
        match self.store.get(DOMAINS, name).await? {
            Some(doc) => doc.decode(DOMAINS),
            None => Err(RoutingError::NotFound(format!("domain {}", name))),
        }
    }

    /// The record for `name`, provided `owner` owns it.
    pub async fn owned(&self, owner: &str, name: &str) -> Result<LegacyDomainRecord> {
        let record = self.get(name).await?;
        if record.owner_id != owner {
            return Err(RoutingError::Forbidden(format!("domain {}", name)));
        }
        Ok(record)
    }

    /// Remove the domain, its URL configs, and every API key issued for it.
    pub async fn delete(&self, owner: &str, name: &str) -> Result<()> {
        self.owned(owner, name).await?;

        // Keys first: a later registration of the same name must not inherit them.
        let keys = self
            .store
            .query(API_KEYS, &[Filter::eq("dominio", name)], None)
            .await?;
        for doc in &keys {
            self.store.delete(API_KEYS, &doc.id).await?;
        }

        let urls = sub_collection(DOMAINS, name, DOMAIN_URLS);
        for doc in self.store.get_all(&urls).await? {
            self.store.delete(&urls, &doc.id).await?;
        }
        self.store.delete(DOMAINS, name).await?;

        tracing::info!(domain = name, owner, keys = keys.len(), "Domain deleted");
        Ok(())
    }

    /// Mark the domain verified. The record must carry a verification token;
    /// verifying twice is a no-op.
    pub async fn verify(&self, owner: &str, name: &str) -> Result<LegacyDomainRecord> {
        let mut record = self.owned(owner, name).await?;
        if record.verification_token.as_deref().map_or(true, str::is_empty) {
            return Err(RoutingError::InvalidInput(format!(
                "domain {} has no verification token",
                name
            )));
        }
        if !record.verified {
            record.verified = true;
            self.store
                .set(DOMAINS, name, to_document(DOMAINS, name, &record)?)
                .await?;
            tracing::info!(domain = name, "Domain verified");
        }
        Ok(record)
    }

    pub async fn list_urls(&self, owner: &str, name: &str) -> Result<Vec<UrlConfig>> {
        self.owned(owner, name).await?;
        load_urls(self.store.as_ref(), name).await
    }

    pub async fn add_url(&self, owner: &str, name: &str, new: NewUrlConfig) -> Result<UrlConfig> {
        self.owned(owner, name).await?;
        if new.path.trim().is_empty() {
            return Err(RoutingError::InvalidInput("path is required".into()));
        }

        let mut url = UrlConfig {
            id: String::new(),
            path: new.path,
            cache_size_mb: new.cache_size_mb.unwrap_or_else(default_cache_size_mb),
            allowed_file_types: new
                .allowed_file_types
                .unwrap_or_else(|| Value::Object(Default::default())),
            auth_method: new.auth_method.unwrap_or_else(default_auth_method),
            created_at: Some(Utc::now().to_rfc3339()),
        };
        let collection = sub_collection(DOMAINS, name, DOMAIN_URLS);
        url.id = self
            .store
            .add(&collection, to_document(&collection, "", &url)?)
            .await?;
        Ok(url)
    }

    pub async fn delete_url(&self, owner: &str, name: &str, url_id: &str) -> Result<()> {
        self.owned(owner, name).await?;
        let collection = sub_collection(DOMAINS, name, DOMAIN_URLS);
        if !self.store.delete(&collection, url_id).await? {
            return Err(RoutingError::NotFound(format!("url {}", url_id)));
        }
        Ok(())
    }
}

fn validate_origin(origin: &str) -> Result<String> {
    let parsed = url::Url::parse(origin)
        .map_err(|e| RoutingError::InvalidInput(format!("origin {:?}: {}", origin, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(origin.to_string()),
        _ => Err(RoutingError::InvalidInput(format!(
            "origin {:?} must be an http(s) URL with a host",
            origin
        ))),
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TOKEN_LEN)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect();
    format!("{}{}", TOKEN_PREFIX, suffix)
}

pub(crate) fn to_document<T: Serialize>(collection: &str, key: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| RoutingError::Corrupt {
        collection: collection.to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}
