use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_vault::{
    api,
    blob_store::{self, BlobStore},
    config::Config,
    manager::FileManager,
    search_index::{ElasticIndex, SearchIndex},
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "doc-vault starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db = Database::open(&config.data_dir)?;
    info!("Database opened at: {}", config.data_dir);

    // Initialize the blob store backend
    let blobs: Arc<dyn BlobStore> = {
        let store = blob_store::LocalBlobStore::new(&config.storage.root)?;
        info!("Using local blob store at: {}", config.storage.root);
        Arc::new(store)
    };

    // Initialize the search index backend. Indexing is best-effort
    // throughout: an unreachable engine must not block startup or uploads,
    // so schema creation failures only log.
    let index: Option<Arc<dyn SearchIndex>> = match config.search {
        Some(ref search_config) => {
            let index = ElasticIndex::new(search_config)?;
            if let Err(e) = index.ensure_schema().await {
                tracing::warn!(error = %e, "failed to ensure search schema; indexing will retry per document");
            }
            info!(
                url = %search_config.url,
                index = %search_config.index,
                "Search indexing enabled"
            );
            Some(Arc::new(index))
        }
        None => {
            info!("SEARCH_URL not set — search indexing disabled");
            None
        }
    };

    // Create the orchestrator and shared state
    let manager = FileManager::new(db.clone(), Arc::clone(&blobs), index, &config);
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        manager,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on: {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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

    info!("Shutdown signal received, draining connections");
}
