use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use item_gateway::app::{app, AppState};
use item_gateway::config::{AppConfig, StoreBackend};
use item_gateway::database::{DatabaseManager, ItemStore, MemoryItemStore, PgItemStore};
use item_gateway::gateway::AggregationGateway;
use item_gateway::identity::{CachedIdentityClient, HttpIdentityClient, IdentityClient};

#[derive(Parser)]
#[command(name = "item-gateway")]
#[command(about = "Geotagged item API joining local storage with a remote identity service")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Item store backend: memory or postgres (overrides ITEM_STORE)")]
    store: Option<StoreBackend>,

    #[arg(long, help = "Identity service base URL (overrides AUTH_URL)")]
    identity_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, AUTH_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = item_gateway::config::config().clone();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(store) = args.store {
        config.database.backend = store;
    }
    if let Some(url) = args.identity_url {
        config.identity.base_url = url;
    }
    tracing::info!("Starting item gateway in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set, every bearer token will be rejected");
    }

    let store = build_store(&config).await?;
    let identity = build_identity_client(&config)?;
    let gateway = AggregationGateway::new(store, identity)
        .with_hydration_concurrency(config.identity.hydration_concurrency);

    let state = AppState::new(gateway, config.security.jwt_secret.clone());
    let router = app(state, &config.api, &config.security);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Item gateway listening on http://{}", bind_addr);
    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ItemStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory item store");
            Ok(Arc::new(MemoryItemStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to item database")?;
            let store = PgItemStore::new(pool);
            if config.database.ensure_schema {
                store.ensure_schema().await.context("failed to prepare items table")?;
            }
            Ok(Arc::new(store))
        }
    }
}

fn build_identity_client(config: &AppConfig) -> anyhow::Result<Arc<dyn IdentityClient>> {
    let base_url = url::Url::parse(&config.identity.base_url)
        .with_context(|| format!("invalid identity service URL '{}'", config.identity.base_url))?;
    let http = HttpIdentityClient::new(base_url, Duration::from_millis(config.identity.timeout_ms))
        .context("failed to build identity service client")?;

    if config.identity.cache_ttl_secs == 0 {
        return Ok(Arc::new(http));
    }

    tracing::info!(
        "Caching identities for {}s (capacity {})",
        config.identity.cache_ttl_secs,
        config.identity.cache_capacity
    );
    Ok(Arc::new(CachedIdentityClient::new(
        http,
        Duration::from_secs(config.identity.cache_ttl_secs),
        config.identity.cache_capacity,
    )))
}
