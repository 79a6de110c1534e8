/// Stored document schemas.
///
/// Field names on disk and on the wire keep the historical Spanish keys
/// (`pais`, `inicio`, `servidor_origen`, ...); the Rust side uses English
/// names with serde renames.
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Collections ──────────────────────────────────────────────────────

pub const IP_RANGES: &str = "ip_to_country";
pub const CACHE_NODES: &str = "caches_zonales";
pub const ROUTING_RECORDS: &str = "registros_dns";
pub const DOMAINS: &str = "dominios";
pub const DOMAIN_URLS: &str = "urls";
pub const API_KEYS: &str = "api_keys";

/// Port assumed when a cache node or health check leaves it unset.
pub const DEFAULT_PORT: u16 = 80;

// ── Geo routing ──────────────────────────────────────────────────────

/// Inclusive IPv4 range mapped to a country code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    #[serde(rename = "inicio")]
    pub start: u32,
    #[serde(rename = "fin")]
    pub end: u32,
    #[serde(rename = "pais")]
    pub country: String,
}

/// Zonal edge cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNode {
    #[serde(rename = "pais")]
    pub country: String,
    #[serde(rename = "ip")]
    pub address: String,
    #[serde(rename = "puerto", default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "activo", default)]
    pub active: bool,
}

impl CacheNode {
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

// ── Domain routing ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "puerto", default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// DNS-style routing record, keyed by domain. Preferred over the legacy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRecord {
    #[serde(rename = "tipo", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
}

/// Older per-domain configuration, keyed by domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyDomainRecord {
    #[serde(rename = "nombre")]
    pub domain: String,
    #[serde(rename = "propietario_id", default)]
    pub owner_id: String,
    #[serde(rename = "verificado", default)]
    pub verified: bool,
    #[serde(rename = "txt_record", default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(rename = "servidor_origen", default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(rename = "creado_en", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Per-path cache settings stored under a legacy domain. Opaque to routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "tamanio_cache_mb", default = "default_cache_size_mb")]
    pub cache_size_mb: u32,
    #[serde(rename = "tipos_archivo", default = "empty_object")]
    pub allowed_file_types: Value,
    #[serde(rename = "metodo_autenticacion", default = "default_auth_method")]
    pub auth_method: String,
    #[serde(rename = "creado_en", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// ── API keys ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub key: String,
    #[serde(rename = "dominio")]
    pub domain: String,
    #[serde(rename = "nombre", default = "default_key_name")]
    pub name: String,
    #[serde(rename = "activa", default)]
    pub active: bool,
    #[serde(rename = "creado_en", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// ── Defaults ─────────────────────────────────────────────────────────

pub fn default_cache_size_mb() -> u32 {
    50
}
pub fn default_auth_method() -> String {
    "none".into()
}
pub fn default_key_name() -> String {
    "API Key".into()
}
fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_node_default_port() {
        let node: CacheNode =
            serde_json::from_value(json!({"pais": "US", "ip": "1.2.3.4", "activo": true})).unwrap();
        assert_eq!(node.port, None);
        assert_eq!(node.port_or_default(), 80);
        assert!(node.active);
    }

    #[test]
    fn test_inactive_when_flag_missing() {
        let node: CacheNode =
            serde_json::from_value(json!({"pais": "US", "ip": "1.2.3.4", "puerto": 8080})).unwrap();
        assert!(!node.active);
        assert_eq!(node.port_or_default(), 8080);
    }

    #[test]
    fn test_range_field_names() {
        let range: IpRange =
            serde_json::from_value(json!({"inicio": 1000, "fin": 2000, "pais": "CR"})).unwrap();
        assert_eq!(range, IpRange { start: 1000, end: 2000, country: "CR".into() });
    }

    #[test]
    fn test_url_config_defaults() {
        let url: UrlConfig = serde_json::from_value(json!({"path": "/img"})).unwrap();
        assert_eq!(url.cache_size_mb, 50);
        assert_eq!(url.auth_method, "none");
        assert_eq!(url.allowed_file_types, json!({}));
        assert!(url.id.is_empty());
    }

    #[test]
    fn test_routing_record_health_check() {
        let record: RoutingRecord = serde_json::from_value(json!({
            "tipo": "A",
            "ips": ["10.0.0.5", "10.0.0.6"],
            "health_check": {"puerto": 8080, "path": "/health"}
        }))
        .unwrap();
        assert_eq!(record.kind.as_deref(), Some("A"));
        assert_eq!(record.health_check.unwrap().port, Some(8080));
    }

    #[test]
    fn test_legacy_record_serializes_spanish_keys() {
        let record = LegacyDomainRecord {
            domain: "b.com".into(),
            owner_id: "admin".into(),
            verified: false,
            verification_token: Some("verify-abc".into()),
            origin: None,
            created_at: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["nombre"], "b.com");
        assert_eq!(value["verificado"], false);
        assert_eq!(value["txt_record"], "verify-abc");
        assert!(value.get("servidor_origen").is_none());
    }
}
