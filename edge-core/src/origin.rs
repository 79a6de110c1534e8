/// Origin resolution: registered domain -> upstream origin.
///
/// A routing record for the domain always wins over a legacy domain record.
/// Both are read from the store on every call.
use edge_proto::records::{
    HealthCheck, LegacyDomainRecord, RoutingRecord, UrlConfig, DEFAULT_PORT, DOMAINS, DOMAIN_URLS,
    ROUTING_RECORDS,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Result, RoutingError};
use crate::store::{sub_collection, DocumentStore, Filter};

/// The record that decides how a domain is reached.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainRoute {
    Routing(RoutingRecord),
    Legacy {
        record: LegacyDomainRecord,
        urls: Vec<UrlConfig>,
    },
}

/// Resolved origin plus the record-specific metadata, in the shape served
/// to edge nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OriginConfig {
    Routing {
        #[serde(rename = "nombre")]
        domain: String,
        /// Absent when the record lists no addresses.
        #[serde(rename = "servidor_origen")]
        origin: Option<String>,
        #[serde(rename = "tipo")]
        kind: Option<String>,
        ips: Vec<String>,
        health_check: Option<HealthCheck>,
    },
    Legacy {
        #[serde(rename = "nombre")]
        domain: String,
        #[serde(rename = "verificado")]
        verified: bool,
        #[serde(rename = "servidor_origen")]
        origin: String,
        urls: Vec<UrlConfig>,
    },
}

impl OriginConfig {
    pub fn origin(&self) -> Option<&str> {
        match self {
            OriginConfig::Routing { origin, .. } => origin.as_deref(),
            OriginConfig::Legacy { origin, .. } => Some(origin),
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            OriginConfig::Routing { domain, .. } | OriginConfig::Legacy { domain, .. } => domain,
        }
    }
}

impl DomainRoute {
    pub fn into_config(self, domain: &str) -> OriginConfig {
        match self {
            DomainRoute::Routing(record) => {
                // Only the first address is the active origin; the rest are informational.
                let port = record
                    .health_check
                    .as_ref()
                    .and_then(|hc| hc.port)
                    .unwrap_or(DEFAULT_PORT);
                let origin = record
                    .ips
                    .first()
                    .map(|ip| format!("http://{}:{}", ip, port));
                OriginConfig::Routing {
                    domain: domain.to_string(),
                    origin,
                    kind: record.kind,
                    ips: record.ips,
                    health_check: record.health_check,
                }
            }
            DomainRoute::Legacy { record, urls } => OriginConfig::Legacy {
                origin: legacy_origin(&record),
                domain: record.domain,
                verified: record.verified,
                urls,
            },
        }
    }
}

/// The stored origin when it is non-blank, otherwise `http://<domain>`.
pub fn legacy_origin(record: &LegacyDomainRecord) -> String {
    match record.origin.as_deref().map(str::trim) {
        Some(origin) if !origin.is_empty() => origin.to_string(),
        _ => format!("http://{}", record.domain),
    }
}

#[derive(Clone)]
pub struct OriginResolver {
    store: Arc<dyn DocumentStore>,
}

impl OriginResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Find the record governing `domain`. `None` when neither exists.
    pub async fn lookup(&self, domain: &str) -> Result<Option<DomainRoute>> {
        if let Some(doc) = self.store.get(ROUTING_RECORDS, domain).await? {
            return Ok(Some(DomainRoute::Routing(doc.decode(ROUTING_RECORDS)?)));
        }

        let found = self
            .store
            .query(DOMAINS, &[Filter::eq("nombre", domain)], Some(1))
            .await?;
        let Some(doc) = found.into_iter().next() else {
            return Ok(None);
        };
        let record: LegacyDomainRecord = doc.decode(DOMAINS)?;
        let urls = load_urls(self.store.as_ref(), &doc.id).await?;
        Ok(Some(DomainRoute::Legacy { record, urls }))
    }

    pub async fn resolve_origin(&self, domain: &str) -> Result<Option<OriginConfig>> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(RoutingError::InvalidInput("domain is required".into()));
        }
        let config = self.lookup(domain).await?.map(|route| route.into_config(domain));
        match &config {
            Some(config) => tracing::debug!(domain, origin = ?config.origin(), "Origin resolved"),
            None => tracing::debug!(domain, "No routing or domain record"),
        }
        Ok(config)
    }
}

/// Per-path configs stored under a legacy domain document, ids filled in.
pub(crate) async fn load_urls(store: &dyn DocumentStore, domain_key: &str) -> Result<Vec<UrlConfig>> {
    let collection = sub_collection(DOMAINS, domain_key, DOMAIN_URLS);
    store
        .get_all(&collection)
        .await?
        .into_iter()
        .map(|doc| -> Result<UrlConfig> {
            let mut url: UrlConfig = doc.decode(&collection)?;
            url.id = doc.id;
            Ok(url)
        })
        .collect()
}
