/// Configuration parsing for the hub.
use serde::Deserialize;
use std::path::Path;

// ── Hub config ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerListenConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub routing: RoutingSettings,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerListenConfig {
    #[serde(default = "default_listen_addr")]
    pub listen: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            port: default_port(),
            tls: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TlsConfig {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// JSON file used to seed the in-process document store.
    #[serde(default)]
    pub seed_file: Option<String>,
    /// Upper bound for a single store round trip.
    #[serde(default = "default_store_timeout")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed_file: None,
            timeout_ms: default_store_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoutingSettings {
    /// How often the range table and cache directory are reloaded.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_sec: u64,
    /// Newline-delimited reserved domain list.
    #[serde(default)]
    pub reserved_names: Option<String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            refresh_interval_sec: default_refresh_interval(),
            reserved_names: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub operators: Vec<OperatorConfig>,
}

/// A static bearer token and the owner id it acts as.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_store_timeout() -> u64 {
    5000
}
fn default_refresh_interval() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".into()
}

const MIN_TOKEN_LEN: usize = 16;

// ── Loaders ──────────────────────────────────────────────────────────

pub fn load_hub_config(path: &Path) -> Result<HubConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    parse_hub_config(&content)
}

pub fn parse_hub_config(content: &str) -> Result<HubConfig, Box<dyn std::error::Error>> {
    let config: HubConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl HubConfig {
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.store.timeout_ms == 0 {
            return Err("store.timeout_ms must be greater than zero".into());
        }
        if self.routing.refresh_interval_sec == 0 {
            return Err("routing.refresh_interval_sec must be greater than zero".into());
        }
        for (i, op) in self.auth.operators.iter().enumerate() {
            if op.id.trim().is_empty() {
                return Err(format!("auth.operators[{}]: id must not be empty", i).into());
            }
            if op.token.len() < MIN_TOKEN_LEN {
                return Err(format!(
                    "auth.operators[{}]: token must be at least {} characters",
                    i, MIN_TOKEN_LEN
                )
                .into());
            }
            if self.auth.operators[..i].iter().any(|o| o.token == op.token) {
                return Err(format!("auth.operators[{}]: duplicate token", i).into());
            }
        }
        Ok(())
    }
}
