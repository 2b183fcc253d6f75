use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dossier_core::{
    load_config, validate_config, CreditLedger, DetailCache, HttpProviderClient, ProviderClient,
    SqliteDetailCache, SqliteLedger, SqliteTaskStore, TaskCollector, TaskStore,
};

use dossier_server::api::create_router;
use dossier_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Dossier v{}", VERSION);

    // Determine config path
    let config_path = std::env::var("DOSSIER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Billing policy: {}", config.pricing.billing.as_str());

    // Log a config fingerprint so deployments can be told apart
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Create SQLite task store
    let task_store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::new(&config.database.path)
            .context("Failed to create task store")?
            .with_log_cap(config.collector.task_log_cap),
    );
    info!("Task store initialized");

    // Create SQLite credit ledger
    let ledger: Arc<dyn CreditLedger> = Arc::new(
        SqliteLedger::new(&config.database.path).context("Failed to create credit ledger")?,
    );
    info!("Credit ledger initialized");

    // Create SQLite detail cache
    let cache: Arc<dyn DetailCache> = Arc::new(
        SqliteDetailCache::new(&config.database.path).context("Failed to create detail cache")?,
    );
    match cache.purge_expired() {
        Ok(purged) if purged > 0 => info!("Purged {} expired cache entries", purged),
        Ok(_) => {}
        Err(e) => warn!("Cache purge failed: {}", e),
    }
    info!("Detail cache initialized");

    // Create lookup provider client if configured
    let provider: Option<Arc<dyn ProviderClient>> = match &config.provider {
        Some(provider_config) => {
            info!("Initializing lookup provider at {}", provider_config.url);
            Some(Arc::new(
                HttpProviderClient::new(provider_config.clone())
                    .context("Failed to create provider client")?,
            ))
        }
        None => {
            warn!("No lookup provider configured; task submission is disabled");
            None
        }
    };

    // Create the collector when a provider is available
    let collector = provider.map(|provider| {
        TaskCollector::new(
            config.collector.clone(),
            config.pricing.clone(),
            Arc::clone(&task_store),
            Arc::clone(&ledger),
            Arc::clone(&cache),
            provider,
        )
    });
    if collector.is_some() {
        info!(
            "Collector initialized (wave size {}, billing {})",
            config.collector.wave_size,
            config.pricing.billing.as_str()
        );
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        task_store,
        ledger,
        cache,
        collector,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
