use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{
    error::StartupError,
    services::{generate_qr, health},
    state::AppState,
};
use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::UploadBroker;
use crate::secrets::{self, SecretProvider};
use crate::storage::StorageClient;
use crate::worker::{self, WorkerPool};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything the startup phase produces
pub struct Service {
    pub state: AppState,
    pub workers: WorkerPool,
}

/// Startup phase: secrets, storage client, broker and workers
///
/// Secrets are read exactly once here. Any failure aborts startup before the
/// listener is bound.
pub async fn bootstrap(
    config: Config,
    provider: &dyn SecretProvider,
) -> Result<Service, StartupError> {
    let storage_secrets = secrets::load_storage_secrets(provider, &config.secrets).await?;

    let storage = Arc::new(StorageClient::from_config(&config.storage, &storage_secrets)?);
    info!(container = %storage.container, "Storage client ready");

    let metrics = Arc::new(Metrics::new());

    let (broker, receivers) =
        UploadBroker::new(config.workers.count, config.workers.channel_size);
    let workers = worker::spawn_pool(receivers, storage.clone(), metrics.clone());
    info!(workers = workers.len(), "Upload workers started");

    let state = AppState::new(config, storage, broker, metrics);

    Ok(Service { state, workers })
}

/// HTTP routes with CORS, request decompression and request tracing
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/generate-qr/", post(generate_qr))
        .route("/generate-qr", post(generate_qr))
        .route("/health", get(health))
        .with_state(state)
        // Handles Content-Encoding (gzip) before the handler reads the body
        .layer(RequestDecompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.server.bind_addr;
    let drain_timeout = Duration::from_secs(config.workers.drain_timeout_secs);

    let provider = secrets::provider_from_config(&config.secrets)?;
    let Service { state, workers } = bootstrap(config, provider.as_ref()).await?;
    drop(provider);

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "qrstash API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the last broker handle) is gone; workers now
    // finish whatever is still queued and exit.
    if !workers.drain(drain_timeout).await {
        warn!("Shutting down with uploads still queued");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
