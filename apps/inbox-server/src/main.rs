//! Event inbox server: ingress capture plus the delivery worker in one
//! process. Additional worker capacity comes from running more replicas of
//! this binary; the `SKIP LOCKED` claim keeps them from stepping on each
//! other.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

use event_inbox_api::{
    inbox_router, ApiDoc, AppState, BlobConfig, BlobStore, DeliveryService, DeliveryWorker,
    EndpointService, IngestService, PayloadCipher,
};
use event_inbox_db::{run_migrations, DbPool, DbPoolOptions};

mod config;
use config::Config;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long to wait for the database to come up before giving up.
const DB_CONNECT_WINDOW: Duration = Duration::from_secs(30);

/// How long in-flight worker jobs get after shutdown is requested.
const WORKER_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting event inbox v{}", VERSION);

    let config = Config::from_env()?;

    let cipher = Arc::new(PayloadCipher::from_base64(&config.payload_enc_key_b64)?);
    let blob = Arc::new(BlobStore::new(BlobConfig {
        endpoint: config.s3_endpoint.clone(),
        region: config.s3_region.clone(),
        bucket: config.s3_bucket.clone(),
        access_key: config.s3_access_key.clone(),
        secret_key: config.s3_secret_key.clone(),
    })?);

    info!("Connecting to database");
    let pool = DbPool::connect_with_retry(
        &config.database_url,
        DbPoolOptions::default(),
        DB_CONNECT_WINDOW,
    )
    .await?;

    run_migrations(&pool).await?;

    let ingest_service = Arc::new(IngestService::new(
        pool.inner().clone(),
        cipher.clone(),
        blob.clone(),
        config.max_body_bytes,
    ));
    let endpoint_service = Arc::new(EndpointService::new(pool.inner().clone()));
    let delivery_service = DeliveryService::new(pool.inner().clone(), blob, cipher)?;

    let state = AppState {
        ingest_service,
        endpoint_service,
        max_body_bytes: config.max_body_bytes,
    };

    let app = inbox_router(state)
        .route("/docs/openapi.json", get(openapi_handler))
        .layer(TraceLayer::new_for_http());

    // One worker replica per process, cancelled from the shutdown path.
    let worker_token = tokio_util::sync::CancellationToken::new();
    let worker = DeliveryWorker::new(delivery_service, worker_token.clone());
    let worker_handle = tokio::spawn(worker.run());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app_port));
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Inbox server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    worker_token.cancel();
    match tokio::time::timeout(WORKER_DRAIN, worker_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Delivery worker task failed"),
        Err(_) => error!("Delivery worker did not stop within the drain window"),
    }

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Serve the OpenAPI document.
async fn openapi_handler() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

/// Initialize structured logging.
fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Graceful shutdown on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                // Fall through - we still want to wait for terminate signal
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                // Wait forever if we can't install the handler
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
