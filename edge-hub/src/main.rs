mod api;
mod auth;
mod state;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use edge_core::api_keys::ApiKeyService;
use edge_core::domains::DomainRegistry;
use edge_core::origin::OriginResolver;
use edge_core::reserved::ReservedNames;
use edge_core::snapshot::{spawn_refresher, SnapshotCell};
use edge_core::store::{DocumentStore, MemoryStore, TimedStore};
use edge_core::zones::ZoneFallbackMap;
use edge_core::GeoRoutingService;
use edge_proto::config::load_hub_config;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Duration;

use crate::auth::OperatorTokens;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "edge-hub", about = "Edge Hub: geo-routing control plane for zonal caches")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "/etc/edge-hub/hub.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = load_hub_config(&cli.config)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;

    // Setup logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    tracing::info!("Edge Hub starting");

    // Document store
    let memory = match &config.store.seed_file {
        Some(path) => {
            let store = MemoryStore::load_seed_file(Path::new(path))
                .await
                .with_context(|| format!("failed to load seed file {}", path))?;
            tracing::info!("Store seeded from {}", path);
            store
        }
        None => {
            tracing::warn!("No seed file configured, starting with an empty store");
            MemoryStore::new()
        }
    };
    let store: Arc<dyn DocumentStore> = Arc::new(TimedStore::new(
        Arc::new(memory),
        Duration::from_millis(config.store.timeout_ms),
    ));

    // Reserved names
    let reserved = match &config.routing.reserved_names {
        Some(path) => ReservedNames::load(Path::new(path))
            .with_context(|| format!("failed to load reserved names from {}", path))?,
        None => ReservedNames::default(),
    };

    // Routing snapshot: first load inline, then on the refresh interval
    let snapshot = Arc::new(SnapshotCell::new());
    if let Err(e) = snapshot.refresh(store.as_ref()).await {
        tracing::warn!("Initial routing snapshot failed, lookups unavailable until refresh: {}", e);
    }
    let refresh_every = Duration::from_secs(config.routing.refresh_interval_sec);
    let refresher = spawn_refresher(snapshot.clone(), store.clone(), refresh_every);

    let operators = OperatorTokens::new(config.auth.operators.clone());
    if operators.is_empty() {
        tracing::warn!("No operators configured, domain management is disabled");
    } else {
        tracing::info!(operators = operators.len(), "Operator tokens loaded");
    }

    let state = AppState {
        routing: GeoRoutingService::new(
            snapshot,
            ZoneFallbackMap::builtin(),
            OriginResolver::new(store.clone()),
        ),
        domains: DomainRegistry::new(store.clone(), Arc::new(reserved)),
        api_keys: ApiKeyService::new(store),
        operators: Arc::new(operators),
    };
    let app = api::router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.server.listen, config.server.port)
        .parse()
        .context("invalid listen address")?;

    match &config.server.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .context("failed to load TLS certificate")?;
            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            tracing::info!("Hub listening on https://{}", bind_addr);
            axum_server::bind_rustls(bind_addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(bind_addr).await?;
            tracing::info!("Hub listening on http://{}", bind_addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    refresher.abort();
    tracing::info!("Edge Hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = ctrl_c.await;
                tracing::info!("Shutdown signal received");
                return;
            }
        };

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm.recv() => {},
    }
    tracing::info!("Shutdown signal received");
}
